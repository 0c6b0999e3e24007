//! Report rendering: Markdown to HTML, HTML to PDF.
//!
//! HTML conversion is in-process. PDF conversion shells out to an external
//! converter that reads HTML on stdin and writes the PDF to stdout.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use pulldown_cmark::{html, Event, Options, Parser};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{AppError, Result};

/// Boxed future returned by [`PdfRenderer::render`].
pub type RenderFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;

/// Converts a complete HTML document into PDF bytes.
pub trait PdfRenderer: Send + Sync {
    /// Render `html` to a PDF document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` if conversion fails.
    fn render(&self, html: String) -> RenderFuture<'_>;
}

/// Render Markdown to a standalone UTF-8 HTML document.
///
/// Tables and strikethrough are enabled, and single newlines inside a
/// paragraph become line breaks.
#[must_use]
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(
        markdown,
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH,
    )
    .map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Final report</title>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

/// Render a Markdown report straight to PDF bytes.
///
/// # Errors
///
/// Propagates `AppError::Render` from the renderer.
pub async fn report_to_pdf(renderer: &dyn PdfRenderer, markdown: &str) -> Result<Vec<u8>> {
    let html = markdown_to_html(markdown);
    let pdf = renderer.render(html).await?;
    info!(bytes = pdf.len(), "report rendered to pdf");
    Ok(pdf)
}

/// Renderer backed by the `wkhtmltopdf` command-line tool.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfRenderer {
    binary: String,
}

impl WkhtmltopdfRenderer {
    /// Use `binary` as the converter executable.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn convert(&self, html: String) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.binary)
            .args(["--quiet", "--encoding", "utf-8", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| AppError::Render(format!("failed to spawn {}: {err}", self.binary)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Render("converter stdin unavailable".into()))?;

        // Feed stdin concurrently so a full stdout pipe cannot deadlock us.
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(html.as_bytes()).await;
            drop(stdin);
            written
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| AppError::Render(format!("converter did not finish: {err}")))?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(%err, "converter closed stdin early"),
            Err(err) => debug!(%err, "stdin writer task failed"),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Render(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(AppError::Render(format!("{} produced no output", self.binary)));
        }
        Ok(output.stdout)
    }
}

impl PdfRenderer for WkhtmltopdfRenderer {
    fn render(&self, html: String) -> RenderFuture<'_> {
        Box::pin(self.convert(html))
    }
}
