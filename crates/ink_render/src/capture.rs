use std::future::Future;
use std::time::Duration;

/// Navigation is bounded by the browser's own timeout; this caps the whole
/// subprocess, settle time included.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(45);

// ----------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// The capture command could not be launched at all. Aborts the page's
    /// remaining modes: nothing else will succeed either.
    #[error("failed to launch capture command {command:?}: {source}")]
    Unavailable {
        command: String,
        source: std::io::Error,
    },

    #[error("capture command failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("capture command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("capture produced no image file")]
    NoOutput,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Should the current page's remaining modes be skipped?
    #[inline]
    pub fn is_fatal_for_page(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

// ----------------------------------------------------------------------------

/// One screenshot request: a URL rendered into a viewport of exactly
/// `width × height` device pixels.
#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub url: String,
    pub width: u32,
    pub height: u32,

    /// CSS selector to scroll into view before the shot, if the driver
    /// supports it.
    pub scroll_to_element: Option<String>,
}

/// The boundary to the headless browser.
pub trait ViewportCapture: Send + Sync + 'static {
    /// Capture the viewport; resolves to PNG bytes.
    fn capture(
        &self,
        request: &CaptureRequest,
    ) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send;
}

// ----------------------------------------------------------------------------

/// Captures by spawning an external browser command per request.
///
/// The command is a token template; within each token the placeholders
/// `{url}`, `{width}`, `{height}`, `{out}` and `{selector}` are substituted.
/// A token mentioning `{selector}` is dropped entirely when the request has
/// no selector, so drivers that cannot scroll simply leave the placeholder
/// out of their template.
pub struct SubprocessCapture {
    template: Vec<String>,
}

impl Default for SubprocessCapture {
    fn default() -> Self {
        Self {
            template: [
                "chromium",
                "--headless=new",
                "--disable-gpu",
                "--hide-scrollbars",
                "--force-device-scale-factor=1",
                "--window-size={width},{height}",
                "--screenshot={out}",
                "{url}",
            ]
            .map(str::to_owned)
            .to_vec(),
        }
    }
}

impl SubprocessCapture {
    pub fn new(template: Vec<String>) -> Self {
        Self { template }
    }

    fn expand(&self, request: &CaptureRequest, out_path: &str) -> Vec<String> {
        self.template
            .iter()
            .filter_map(|token| {
                if token.contains("{selector}") {
                    let selector = request.scroll_to_element.as_deref()?;
                    return Some(token.replace("{selector}", selector));
                }
                Some(
                    token
                        .replace("{url}", &request.url)
                        .replace("{width}", &request.width.to_string())
                        .replace("{height}", &request.height.to_string())
                        .replace("{out}", out_path),
                )
            })
            .collect()
    }
}

impl ViewportCapture for SubprocessCapture {
    fn capture(
        &self,
        request: &CaptureRequest,
    ) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send {
        async move {
            let out_dir = tempfile::TempDir::new()?;
            let out_path = out_dir.path().join("capture.png");
            let argv = self.expand(request, &out_path.to_string_lossy());

            let (program, args) = argv.split_first().ok_or(CaptureError::NoOutput)?;

            ink_log::debug!("capturing {} at {}x{}", request.url, request.width, request.height);

            let child = tokio::process::Command::new(program)
                .args(args)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| CaptureError::Unavailable {
                    command: program.clone(),
                    source,
                })?;

            let output = tokio::time::timeout(CAPTURE_TIMEOUT, child.wait_with_output())
                .await
                .map_err(|_| CaptureError::TimedOut(CAPTURE_TIMEOUT))??;

            if !output.status.success() {
                return Err(CaptureError::Failed {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                });
            }

            match tokio::fs::read(&out_path).await {
                Ok(png) => Ok(png),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    Err(CaptureError::NoOutput)
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn request(selector: Option<&str>) -> CaptureRequest {
        CaptureRequest {
            url: "https://example.com".to_owned(),
            width: 960,
            height: 1600,
            scroll_to_element: selector.map(str::to_owned),
        }
    }

    #[test]
    fn expands_placeholders() {
        let capture = SubprocessCapture::default();
        let argv = capture.expand(&request(None), "/tmp/shot.png");

        assert_eq!(argv[0], "chromium");
        assert!(argv.contains(&"--window-size=960,1600".to_owned()));
        assert!(argv.contains(&"--screenshot=/tmp/shot.png".to_owned()));
        assert_eq!(argv.last().unwrap(), "https://example.com");
    }

    #[test]
    fn selector_tokens_are_dropped_without_a_selector() {
        let capture = SubprocessCapture::new(
            ["render-page", "--scroll-to={selector}", "{url}"]
                .map(str::to_owned)
                .to_vec(),
        );

        let without = capture.expand(&request(None), "/tmp/o.png");
        assert_eq!(without, vec!["render-page", "https://example.com"]);

        let with = capture.expand(&request(Some("#main")), "/tmp/o.png");
        assert_eq!(
            with,
            vec!["render-page", "--scroll-to=#main", "https://example.com"]
        );
    }
}
