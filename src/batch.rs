//! Sequential batch conversion.
//!
//! A [`Batch`] is a lazy iterator: each `next()` loads, transforms and
//! encodes exactly one image, so the caller decides when the next item
//! runs and at most one decoded image is alive at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::asset::ImageAsset;
use crate::error::{Error, Result};
use crate::settings::TransformSettings;
use crate::transform::{Converter, EncodedResult};

/// shared flag checked between batch items
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// outcome for one input, in input order
#[derive(Debug)]
pub struct BatchItem {
    pub index: usize,
    pub result: Result<EncodedResult>,
}

pub struct Batch<'a, I> {
    converter: &'a Converter,
    settings: TransformSettings,
    sources: I,
    next_index: usize,
    cancel: CancelToken,
    finished: bool,
}

impl Converter {
    /// Convert `sources` one by one with a snapshot of `settings`.
    ///
    /// A failing item is reported and the batch moves on. Once `cancel`
    /// fires, the next pull yields a single `Cancelled` item and the
    /// batch ends.
    pub fn batch<I>(
        &self,
        sources: I,
        settings: &TransformSettings,
        cancel: CancelToken,
    ) -> Batch<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Result<ImageAsset>>,
    {
        Batch {
            converter: self,
            settings: *settings,
            sources: sources.into_iter(),
            next_index: 0,
            cancel,
            finished: false,
        }
    }
}

impl<I> Iterator for Batch<'_, I>
where
    I: Iterator<Item = Result<ImageAsset>>,
{
    type Item = BatchItem;

    fn next(&mut self) -> Option<BatchItem> {
        if self.finished {
            return None;
        }
        let index = self.next_index;
        // checked before pulling, so a cancelled batch never loads another source
        if self.cancel.is_cancelled() {
            self.finished = true;
            return Some(BatchItem {
                index,
                result: Err(Error::Cancelled),
            });
        }
        let Some(source) = self.sources.next() else {
            self.finished = true;
            return None;
        };
        self.next_index += 1;
        let result = source.and_then(|asset| self.converter.transform(&asset, &self.settings));
        Some(BatchItem { index, result })
    }
}
