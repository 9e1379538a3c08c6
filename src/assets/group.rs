//! Load group barrier.

use std::path::PathBuf;

use crate::assets::texture_load::{LoadStatus, TextureLoad};
use crate::errors::AfterglowError;
use crate::resources::image::DecodedImage;
use crate::resources::texture::TextureParams;

/// The three independent barriers of an [`AssetLoader`](super::AssetLoader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadGroupKind {
    /// Loaded first; its completion starts the other two groups.
    Pre,
    /// Required before the application counts as loaded.
    Must,
    /// Optional content streamed alongside `Must`.
    Sub,
}

impl LoadGroupKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Must => "must",
            Self::Sub => "sub",
        }
    }
}

#[derive(Debug)]
pub(crate) struct LoadRequest {
    pub name: String,
    pub path: PathBuf,
    pub params: TextureParams,
}

/// One settled request.
#[derive(Debug)]
pub(crate) enum Settled {
    Loaded {
        name: String,
        params: TextureParams,
        image: DecodedImage,
    },
    Failed {
        name: String,
        error: AfterglowError,
    },
}

/// Completion barrier over a set of texture requests.
///
/// The group completes once every request has settled, success or failure.
/// An empty group completes as soon as it is started.
#[derive(Debug)]
pub struct LoadGroup {
    kind: LoadGroupKind,
    queued: Vec<LoadRequest>,
    in_flight: Vec<(String, TextureLoad)>,
    total: usize,
    settled: usize,
    started: bool,
    notified: bool,
}

impl LoadGroup {
    pub(crate) fn new(kind: LoadGroupKind) -> Self {
        Self {
            kind,
            queued: Vec::new(),
            in_flight: Vec::new(),
            total: 0,
            settled: 0,
            started: false,
            notified: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> LoadGroupKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Every request has settled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.started && self.settled == self.total
    }

    /// `(settled, total)`.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        (self.settled, self.total)
    }

    pub(crate) fn push(&mut self, request: LoadRequest) {
        self.total += 1;
        if self.started {
            let load = TextureLoad::spawn(request.path, request.params);
            self.in_flight.push((request.name, load));
        } else {
            self.queued.push(request);
        }
    }

    pub(crate) fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        log::debug!(
            "Starting load group '{}' ({} textures)",
            self.kind.name(),
            self.total
        );
        for request in self.queued.drain(..) {
            let load = TextureLoad::spawn(request.path, request.params);
            self.in_flight.push((request.name, load));
        }
    }

    /// Collect every request that settled since the last poll.
    pub(crate) fn poll(&mut self) -> Vec<Settled> {
        let mut settled = Vec::new();
        let mut i = 0;
        while i < self.in_flight.len() {
            let status = self.in_flight[i].1.poll();
            match status {
                LoadStatus::Pending => i += 1,
                LoadStatus::Ready(image) => {
                    let (name, load) = self.in_flight.swap_remove(i);
                    settled.push(Settled::Loaded {
                        name,
                        params: *load.params(),
                        image,
                    });
                }
                LoadStatus::Failed(error) => {
                    let (name, _) = self.in_flight.swap_remove(i);
                    settled.push(Settled::Failed { name, error });
                }
            }
        }
        self.settled += settled.len();
        settled
    }

    /// Returns `true` exactly once, the first time the group is seen complete.
    pub(crate) fn take_completion(&mut self) -> bool {
        if self.is_complete() && !self.notified {
            self.notified = true;
            true
        } else {
            false
        }
    }

    #[inline]
    pub(crate) fn notified(&self) -> bool {
        self.notified
    }
}
