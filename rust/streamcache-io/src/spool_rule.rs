/// A rule deciding whether captured content of a given length should be
/// spooled to disk.
///
/// Rules are consulted before each write with the length the content would
/// reach after that write. Several rules are combined by the caching strategy,
/// either requiring all of them to agree or letting any of them trigger.
pub trait SpoolRule: std::fmt::Debug + Send + Sync + 'static {
    fn should_spool(&self, length: u64) -> bool;
}
