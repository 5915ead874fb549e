pub mod cmd;
pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
