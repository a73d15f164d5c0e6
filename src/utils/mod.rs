pub mod append_log;
pub mod logging;
#[cfg(test)]
pub mod test_utils;
pub mod url;
