use bytes::Bytes;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::io::StreamReader;

pub(crate) type PieceSender = mpsc::Sender<io::Result<Bytes>>;

/// Bytes of a stored object, produced by a background task as chunks are
/// read back from their nodes.
///
/// The stream ends cleanly only once every chunk has been delivered in full.
/// Any failure on the way arrives as an `Err` item and ends the stream.
/// Dropping the stream stops the producer.
#[derive(Debug)]
pub struct ObjectStream {
    pieces: mpsc::Receiver<io::Result<Bytes>>,
}

impl ObjectStream {
    pub(crate) fn channel(buffer: usize) -> (PieceSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { pieces: rx })
    }

    /// Adapt the stream into an `AsyncRead`.
    pub fn into_reader(self) -> StreamReader<Self, Bytes> {
        StreamReader::new(self)
    }
}

impl Stream for ObjectStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.pieces.poll_next_unpin(cx)
    }
}
