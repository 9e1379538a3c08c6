//! Asynchronous texture decoding.
//!
//! A [`TextureLoad`] is a single in-flight request. Decoding happens on a
//! worker thread; the result travels back over a `flume` channel and is
//! picked up by polling on the host thread. There is no cancellation and no
//! timeout: a request either delivers pixels, fails, or stays pending.

use std::path::{Path, PathBuf};

use crate::errors::{AfterglowError, Result};
use crate::resources::image::DecodedImage;
use crate::resources::texture::TextureParams;

/// Outcome of one [`TextureLoad::poll`].
#[derive(Debug)]
pub enum LoadStatus {
    Pending,
    Ready(DecodedImage),
    Failed(AfterglowError),
}

/// An in-flight texture request.
#[derive(Debug)]
pub struct TextureLoad {
    path: PathBuf,
    params: TextureParams,
    receiver: flume::Receiver<Result<DecodedImage>>,
}

impl TextureLoad {
    /// Decode `path` on a worker thread.
    #[must_use]
    pub fn spawn(path: PathBuf, params: TextureParams) -> Self {
        let (sender, load) = Self::channel(path, params);
        let worker_path = load.path.clone();
        let flip_y = params.flip_y.unwrap_or(false);

        let spawned = std::thread::Builder::new()
            .name("afterglow-texture-decode".into())
            .spawn(move || {
                let result = DecodedImage::decode_file(&worker_path, flip_y);
                // The requester may have been dropped; nothing to report to.
                let _ = sender.send(result);
            });
        if let Err(err) = spawned {
            log::warn!(
                "Could not start decode worker for {}: {err}",
                load.path.display()
            );
        }
        load
    }

    /// A request whose result is delivered manually through the returned sender.
    #[must_use]
    pub fn channel(
        path: impl Into<PathBuf>,
        params: TextureParams,
    ) -> (flume::Sender<Result<DecodedImage>>, Self) {
        let (sender, receiver) = flume::bounded(1);
        (
            sender,
            Self {
                path: path.into(),
                params,
                receiver,
            },
        )
    }

    /// A request that is already complete.
    #[must_use]
    pub fn ready(path: impl Into<PathBuf>, params: TextureParams, image: DecodedImage) -> Self {
        let (sender, load) = Self::channel(path, params);
        // Capacity is one and the receiver is alive, so this cannot fail.
        let _ = sender.send(Ok(image));
        load
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &TextureParams {
        &self.params
    }

    /// Non-blocking check for the result.
    ///
    /// `Ready` and `Failed` are terminal; polling again afterwards reports
    /// [`AfterglowError::LoadDisconnected`].
    pub fn poll(&mut self) -> LoadStatus {
        match self.receiver.try_recv() {
            Ok(Ok(image)) => LoadStatus::Ready(image),
            Ok(Err(err)) => LoadStatus::Failed(err),
            Err(flume::TryRecvError::Empty) => LoadStatus::Pending,
            Err(flume::TryRecvError::Disconnected) => {
                LoadStatus::Failed(AfterglowError::LoadDisconnected)
            }
        }
    }

    /// Block until the result arrives.
    pub fn wait(self) -> Result<DecodedImage> {
        self.receiver
            .recv()
            .map_err(|_| AfterglowError::LoadDisconnected)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_delivers_once() {
        let (sender, mut load) = TextureLoad::channel("lut.png", TextureParams::smaa_area());
        assert!(matches!(load.poll(), LoadStatus::Pending));

        sender.send(Ok(DecodedImage::solid(2, 2, [0; 4]))).unwrap();
        drop(sender);
        assert!(matches!(load.poll(), LoadStatus::Ready(_)));
        assert!(matches!(
            load.poll(),
            LoadStatus::Failed(AfterglowError::LoadDisconnected)
        ));
    }

    #[test]
    fn missing_file_fails() {
        let load = TextureLoad::spawn(
            PathBuf::from("definitely/not/here.png"),
            TextureParams::default(),
        );
        assert!(matches!(load.wait(), Err(AfterglowError::IoError(_))));
    }
}
