use async_trait::async_trait;
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{
    io::{AsyncRead, ReadBuf},
    process::Child,
};
use tracing::debug;

use super::Track;
use crate::error::SourceError;

/// Opens a readable audio byte stream for a resolved track.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn open(&self, track: &Track) -> Result<ByteStream, SourceError>;
}

/// Readable byte stream, optionally backed by a child process.
///
/// `close` consumes the stream, so it can run at most once; it reclaims the
/// subprocess. A stream dropped without `close` still kills its process
/// (`kill_on_drop`).
pub struct ByteStream {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    child: Option<Child>,
    eof: bool,
}

impl ByteStream {
    pub fn from_child(child: Child, stdout: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(stdout),
            child: Some(child),
            eof: false,
        }
    }

    #[cfg(test)]
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
            eof: false,
        }
    }

    /// Reclaims the subprocess.
    ///
    /// A stream read to EOF waits for the process and reports a nonzero exit
    /// as [`SourceError::Exit`]. A stream closed early kills the process.
    pub async fn close(mut self) -> Result<(), SourceError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if !self.eof {
            // No se leyó todo: lo cerramos nosotros
            if let Err(e) = child.kill().await {
                debug!("No se pudo terminar el proceso de descarga: {}", e);
            }
            return Ok(());
        }

        match child.wait().await {
            Ok(status) if !status.success() => Err(SourceError::Exit(status)),
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("No se pudo esperar al proceso de descarga: {}", e);
                Ok(())
            }
        }
    }
}

impl AsyncRead for ByteStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        let poll = Pin::new(&mut this.reader).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() == before && buf.remaining() > 0 {
            this.eof = true;
        }
        poll
    }
}
