use rand::{CryptoRng, Error, Rng, RngCore};
use rand_pcg::Pcg64Mcg;

/// A fast, seedable random number generator for tests.
///
/// Prints its seed on creation, so a failing randomized test can be re-run deterministically
/// with `TestRng::from_seed`.
pub(crate) struct TestRng(Pcg64Mcg);

impl TestRng {
    /// Creates a new instance seeded from the thread-local generator, printing the seed.
    pub(crate) fn new() -> Self {
        let seed: u128 = rand::thread_rng().gen();
        println!("TestRng seed: {:032x}", seed);
        TestRng(Pcg64Mcg::new(seed))
    }

    /// Creates a new instance from the given seed.
    #[allow(unused)]
    pub(crate) fn from_seed(seed: u128) -> Self {
        TestRng(Pcg64Mcg::new(seed))
    }
}

impl RngCore for TestRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.0.try_fill_bytes(dest)
    }
}

// The test generator backs key generation in tests; it does not need to be cryptographically
// strong for that.
impl CryptoRng for TestRng {}
