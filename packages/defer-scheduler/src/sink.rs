use tracing::subscriber::NoSubscriber;

/// Where swallowed fire-and-forget failures are reported.
pub trait DiagnosticSink {
    fn report(&self, label: &str, error: &anyhow::Error);
}

/// Logs through `tracing`. With no subscriber active on the current thread
/// the event would go nowhere, so it is written to stderr instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, label: &str, error: &anyhow::Error) {
        if subscriber_active() {
            tracing::error!(scheduler = label, error = %format!("{error:#}"), "deferred effect failed");
        } else {
            eprintln!("{}", fallback_line(label, error));
        }
    }
}

fn subscriber_active() -> bool {
    tracing::dispatcher::get_default(|dispatch| !dispatch.is::<NoSubscriber>())
}

fn fallback_line(label: &str, error: &anyhow::Error) -> String {
    format!("ERROR deferred effect failed scheduler={label} error={error:#}")
}

impl<F> DiagnosticSink for F
where
    F: Fn(&str, &anyhow::Error),
{
    fn report(&self, label: &str, error: &anyhow::Error) {
        self(label, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_line_carries_label_and_error_chain() {
        let error = anyhow::anyhow!("disk full").context("saving draft");
        let line = fallback_line("editor", &error);
        assert!(line.contains("scheduler=editor"));
        assert!(line.contains("saving draft: disk full"));
    }

    #[test]
    fn scoped_subscriber_counts_as_active() {
        let subscriber = tracing_subscriber::fmt().with_writer(std::io::sink).finish();
        tracing::subscriber::with_default(subscriber, || assert!(subscriber_active()));
    }
}
