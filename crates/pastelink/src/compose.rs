//! Composition: weave image references into text at paragraph breaks.
//!
//! Text is split into blocks on blank lines (`"\n\n"`). With `B` blocks there
//! are `B - 1` gaps between them. Up to that many images go into distinct
//! gaps picked by an [`IndexSampler`]; whatever doesn't fit is appended at the
//! end. Images always appear in input order and the text blocks are never
//! reordered.

use cas::ArtifactId;
use chrono::{DateTime, Utc};
use rand::rngs::ThreadRng;
use rand::Rng;

pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Picks distinct indices out of `0..len`.
pub trait IndexSampler {
    /// Return `amount` distinct indices from `0..len`. `amount <= len`.
    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize>;
}

/// Uniform sampling over any `rand` RNG.
#[derive(Debug, Clone)]
pub struct RandomSampler<R> {
    rng: R,
}

impl<R: Rng> RandomSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomSampler<ThreadRng> {
    pub fn thread_local() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl<R: Rng> IndexSampler for RandomSampler<R> {
    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, len, amount.min(len)).into_vec()
    }
}

/// Markdown for an image reference, relative to the text's view URL.
pub fn image_markdown(id: &ArtifactId) -> String {
    format!("![Image](images/{id})")
}

/// Merge image references into `text`. See the module docs for placement.
pub fn compose(text: &str, image_ids: &[ArtifactId], sampler: &mut impl IndexSampler) -> String {
    if image_ids.is_empty() {
        return text.to_string();
    }

    let blocks: Vec<&str> = text.split(BLOCK_SEPARATOR).collect();
    let mut images = image_ids.iter().map(image_markdown);

    if blocks.len() <= 1 {
        let mut out = text.to_string();
        for image in images {
            out.push_str(BLOCK_SEPARATOR);
            out.push_str(&image);
        }
        return out;
    }

    let gaps = blocks.len() - 1;
    let wanted = gaps.min(image_ids.len());
    let mut positions: Vec<usize> = sampler
        .sample(gaps, wanted)
        .into_iter()
        .filter(|&i| i < gaps)
        .collect();
    positions.sort_unstable();
    positions.dedup();

    let mut out: Vec<String> = Vec::with_capacity(blocks.len() + image_ids.len());
    let mut positions = positions.into_iter().peekable();
    for (i, block) in blocks.iter().enumerate() {
        out.push((*block).to_string());
        if positions.next_if_eq(&i).is_some() {
            if let Some(image) = images.next() {
                out.push(image);
            }
        }
    }
    out.extend(images);

    out.join(BLOCK_SEPARATOR)
}

/// Prepend `# {title}` when a non-blank title is given.
pub fn with_title(title: Option<&str>, body: &str) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("# {title}{BLOCK_SEPARATOR}{body}"),
        None => body.to_string(),
    }
}

/// Append the horizontal rule, signature and creation timestamp.
pub fn with_footer(body: &str, signature: &str, at: DateTime<Utc>) -> String {
    format!(
        "{body}{BLOCK_SEPARATOR}---{BLOCK_SEPARATOR}{signature}&emsp;&emsp;&emsp;&emsp;{}",
        at.format("%Y-%m-%d %H:%M:%S")
    )
}
