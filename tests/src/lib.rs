
#[cfg(test)]
mod engine;
