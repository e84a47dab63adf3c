// Random workspace names drawn from a fixed dictionary.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

const BARE_ATTEMPTS: usize = 1000;
const SUFFIXED_ATTEMPTS: usize = 1000;
const SUFFIX_RANGE: u32 = 1000;

/// Lowercase words that each satisfy the workspace name grammar on their own.
pub const WORDS: &[&str] = &[
    "acorn", "alder", "almond", "amber", "anchor", "apricot", "arbor", "aspen", "aurora", "autumn",
    "badger", "bamboo", "basil", "bay", "beacon", "birch", "bison", "blossom", "bluebell", "bramble",
    "breeze", "brook", "cactus", "canyon", "cedar", "cinder", "clover", "cobalt", "comet", "coral",
    "cove", "crane", "crest", "cypress", "dahlia", "dawn", "delta", "dune", "eagle", "ember",
    "falcon", "fennel", "fern", "finch", "fjord", "flint", "forest", "fox", "frost", "garnet",
    "geyser", "ginger", "glacier", "glade", "granite", "grove", "harbor", "hazel", "heron", "hickory",
    "hollow", "honey", "indigo", "iris", "ivy", "jade", "jasper", "juniper", "kelp", "kestrel",
    "lagoon", "lantern", "larch", "lark", "laurel", "lavender", "lichen", "lily", "linden", "lotus",
    "lynx", "magnolia", "maple", "marsh", "meadow", "mesa", "mint", "moss", "nectar", "nutmeg",
    "oak", "oasis", "ocean", "olive", "onyx", "orchid", "osprey", "otter", "pebble", "pepper",
    "pine", "plum", "poppy", "prairie", "quail", "quartz", "quince", "raven", "reed", "ridge",
    "river", "robin", "rowan", "saffron", "sage", "salmon", "sequoia", "shale", "sierra", "slate",
    "sparrow", "spruce", "summit", "sunset", "swallow", "tamarack", "thistle", "thyme", "tide",
    "timber", "topaz", "tulip", "tundra", "valley", "velvet", "violet", "walnut", "willow", "wren",
    "yarrow", "zephyr",
];

#[derive(Debug, Error)]
pub enum NameGenerationError<E> {
    #[error("failed to find an unused workspace name")]
    Exhausted,

    #[error("workspace name existence check failed: {0}")]
    Check(E),
}

/// Generate a workspace name for which `exists` returns `false`.
///
/// Tries bare dictionary words first, then words with a `-<n>` suffix
/// (`n` in `0..1000`). The first error from `exists` aborts the search.
pub fn generate_unused_name<E, F>(exists: F) -> Result<String, NameGenerationError<E>>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    generate_unused_name_with(&mut rand::thread_rng(), exists)
}

/// [`generate_unused_name`] with a caller-supplied RNG.
pub fn generate_unused_name_with<R, E, F>(
    rng: &mut R,
    mut exists: F,
) -> Result<String, NameGenerationError<E>>
where
    R: Rng + ?Sized,
    F: FnMut(&str) -> Result<bool, E>,
{
    for _ in 0..BARE_ATTEMPTS {
        let candidate = random_word(rng).to_string();
        if !exists(&candidate).map_err(NameGenerationError::Check)? {
            return Ok(candidate);
        }
    }

    for _ in 0..SUFFIXED_ATTEMPTS {
        let candidate = format!("{}-{}", random_word(rng), rng.gen_range(0..SUFFIX_RANGE));
        if !exists(&candidate).map_err(NameGenerationError::Check)? {
            return Ok(candidate);
        }
    }

    Err(NameGenerationError::Exhausted)
}

fn random_word<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    WORDS.choose(rng).copied().unwrap_or("workspace")
}
