pub mod engine;
pub mod logging;
pub mod shared;

#[cfg(test)]
pub mod test_support;
