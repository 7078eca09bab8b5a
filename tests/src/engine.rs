mod concurrency;
mod merge;
