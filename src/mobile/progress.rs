/// Progress of a streaming download.
///
/// Counts bytes as they arrive on the wire, so for a compressed asset
/// `transferred` tracks the compressed size and lines up with the
/// `Content-Length` the server declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes received so far
    pub transferred: u64,
    /// Declared size of the body, if the server sent one
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Whole percentage transferred, rounded down.
    ///
    /// `None` when the total is unknown or zero. Not clamped: a server that
    /// under-declares its length produces values above 100.
    pub fn percent(&self) -> Option<u64> {
        match self.total {
            Some(total) if total > 0 => Some(self.transferred.saturating_mul(100) / total),
            _ => None,
        }
    }

    /// Human-readable bytes transferred.
    pub fn transferred_human(&self) -> String {
        format_bytes(self.transferred)
    }
}

/// Receives progress updates during a download.
///
/// Implemented for any `Fn(DownloadProgress)`, so a closure can be passed
/// directly.
pub trait ProgressSink {
    /// Called after every chunk read from the network.
    fn report(&self, progress: DownloadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(DownloadProgress),
{
    fn report(&self, progress: DownloadProgress) {
        self(progress)
    }
}

/// A [`ProgressSink`] that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: DownloadProgress) {}
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
