mod concurrency;
mod decisions;
