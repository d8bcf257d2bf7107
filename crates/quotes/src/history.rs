// In crates/quotes/src/history.rs

use core_types::Quote;
use std::collections::VecDeque;

/// A bounded look-back window of the most recent quotes, oldest first.
#[derive(Debug, Clone)]
pub struct QuoteHistory {
    capacity: usize,
    quotes: VecDeque<Quote>,
}

impl QuoteHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            quotes: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Replaces the whole window, keeping only the newest `capacity` quotes.
    pub fn reset(&mut self, quotes: Vec<Quote>) {
        self.quotes.clear();
        let skip = quotes.len().saturating_sub(self.capacity);
        self.quotes.extend(quotes.into_iter().skip(skip));
    }

    pub fn push(&mut self, quote: Quote) {
        self.quotes.push_back(quote);
        if self.quotes.len() > self.capacity {
            self.quotes.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&Quote> {
        self.quotes.back()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Quote> {
        self.quotes.iter().cloned().collect()
    }
}
