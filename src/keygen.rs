use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of retrieval keys handed out by the store.
pub const RETRIEVAL_KEY_LENGTH: usize = 32;

/// Random string of `length` characters from `[a-zA-Z0-9]`.
///
/// Backed by the thread-local CSPRNG, which is seeded from the OS and
/// periodically reseeded, so successive calls do not repeat in practice.
pub fn generate(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
