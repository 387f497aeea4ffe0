//! Fluent pipeline API.
//!
//! [`Enumerable`] owns one [`Sequence`] and exposes every combinator of
//! [`crate::combinators`] and [`crate::parallel`] as a chainable method:
//!
//! ```no_run
//! # async fn run() -> lazyflow::SeqResult<()> {
//! use lazyflow::Enumerable;
//!
//! let evens = Enumerable::from_iter(1..=100)
//!     .filter(|item, _| Ok(item % 2 == 0))
//!     .parallel_map(4, true, |item, _| async move { Ok(item * 10) })?
//!     .to_vec()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Operators that can reject their arguments (`batch(0)`, zero concurrency, ...) return a
//! [`SeqResult`] immediately; everything else is deferred until the pipeline is pulled.

use futures::stream::Stream;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;

use lazyflow_config::shared::{BufferConfig, ParallelConfig};

use crate::combinators::{self, RetryDecision, Throttle};
use crate::error::{SeqError, SeqResult};
use crate::parallel;
use crate::sequence::{AsyncSource, Mode, Sequence};

/// Chainable wrapper over a [`Sequence`].
pub struct Enumerable<T> {
    sequence: Sequence<T>,
}

impl<T> Enumerable<T> {
    /// Wraps an existing sequence.
    pub fn new(sequence: Sequence<T>) -> Self {
        Self { sequence }
    }

    /// Returns the execution mode of the underlying sequence.
    pub fn mode(&self) -> Mode {
        self.sequence.mode()
    }

    /// Unwraps the underlying sequence.
    pub fn into_sequence(self) -> Sequence<T> {
        self.sequence
    }
}

impl<T> Enumerable<T>
where
    T: Send + 'static,
{
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::new(Sequence::from_iter(items))
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self::new(Sequence::from_stream(stream))
    }

    fn then<U>(self, apply: impl FnOnce(Sequence<T>) -> Sequence<U>) -> Enumerable<U> {
        Enumerable::new(apply(self.sequence))
    }

    fn try_then<U>(
        self,
        apply: impl FnOnce(Sequence<T>) -> SeqResult<Sequence<U>>,
    ) -> SeqResult<Enumerable<U>> {
        apply(self.sequence).map(Enumerable::new)
    }

    // Conversions

    /// Pulls the next element.
    pub async fn next(&mut self) -> Option<SeqResult<T>> {
        self.sequence.next().await
    }

    pub fn to_async(self) -> Self {
        self.then(Sequence::into_async)
    }

    /// Materializes an asynchronous pipeline into a synchronous one.
    pub async fn to_sync(self) -> SeqResult<Self> {
        self.sequence.to_sync().await.map(Enumerable::new)
    }

    pub fn into_stream(self) -> AsyncSource<T> {
        self.sequence.into_stream()
    }

    // Sequential transformations

    pub fn map<U, F>(self, mapper: F) -> Enumerable<U>
    where
        U: Send + 'static,
        F: FnMut(T, usize) -> SeqResult<U> + Send + 'static,
    {
        self.then(|sequence| combinators::map(sequence, mapper))
    }

    pub fn map_async<U, F, Fut>(self, mapper: F) -> Enumerable<U>
    where
        U: Send + 'static,
        F: FnMut(T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<U>> + Send + 'static,
    {
        self.then(|sequence| combinators::map_async(sequence, mapper))
    }

    pub fn map_many<U, I, F>(self, mapper: F) -> Enumerable<U>
    where
        U: Send + 'static,
        I: IntoIterator<Item = U>,
        I::IntoIter: Send + 'static,
        F: FnMut(T, usize) -> SeqResult<I> + Send + 'static,
    {
        self.then(|sequence| combinators::map_many(sequence, mapper))
    }

    pub fn map_many_async<U, F, Fut>(self, mapper: F) -> Enumerable<U>
    where
        U: Send + 'static,
        F: FnMut(T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<Sequence<U>>> + Send + 'static,
    {
        self.then(|sequence| combinators::map_many_async(sequence, mapper))
    }

    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: FnMut(&T, usize) -> SeqResult<bool> + Send + 'static,
    {
        self.then(|sequence| combinators::filter(sequence, predicate))
    }

    pub fn filter_async<F, Fut>(self, predicate: F) -> Self
    where
        F: FnMut(&T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<bool>> + Send + 'static,
    {
        self.then(|sequence| combinators::filter_async(sequence, predicate))
    }

    pub fn intercept<F>(self, interceptor: F) -> Self
    where
        F: FnMut(&T, usize) -> SeqResult<()> + Send + 'static,
    {
        self.then(|sequence| combinators::intercept(sequence, interceptor))
    }

    pub fn intercept_async<F, Fut>(self, interceptor: F) -> Self
    where
        F: FnMut(&T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<()>> + Send + 'static,
    {
        self.then(|sequence| combinators::intercept_async(sequence, interceptor))
    }

    pub fn take(self, count: usize) -> Self {
        self.then(|sequence| combinators::take(sequence, count))
    }

    pub fn skip(self, count: usize) -> Self {
        self.then(|sequence| combinators::skip(sequence, count))
    }

    pub fn take_while<F>(self, predicate: F) -> Self
    where
        F: FnMut(&T, usize) -> SeqResult<bool> + Send + 'static,
    {
        self.then(|sequence| combinators::take_while(sequence, predicate))
    }

    /// Fails with [`crate::error::ErrorKind::AssertionFailed`] at the first element
    /// rejected by `predicate`.
    pub fn assert<F>(self, predicate: F) -> Self
    where
        F: FnMut(&T, usize) -> SeqResult<bool> + Send + 'static,
    {
        self.then(|sequence| combinators::assert(sequence, predicate))
    }

    pub fn distinct<K, F>(self, selector: F) -> Self
    where
        K: Eq + Hash + Send + 'static,
        F: FnMut(&T) -> K + Send + 'static,
    {
        self.then(|sequence| combinators::distinct(sequence, selector))
    }

    pub fn concat(self, other: impl Into<Sequence<T>>) -> Self {
        let other = other.into();
        self.then(|sequence| combinators::concat(sequence, other))
    }

    pub fn default_if_empty(self, default: T) -> Self {
        self.then(|sequence| combinators::default_if_empty(sequence, default))
    }

    pub fn sort_by<F>(self, compare: F) -> Self
    where
        F: FnMut(&T, &T) -> Ordering + Send + 'static,
    {
        self.then(|sequence| combinators::sort_by(sequence, compare))
    }

    pub fn sort_by_key<K, F>(self, selector: F) -> Self
    where
        K: Ord,
        F: FnMut(&T) -> K + Send + 'static,
    {
        self.then(|sequence| combinators::sort_by_key(sequence, selector))
    }

    pub fn batch(self, size: usize) -> SeqResult<Enumerable<Vec<T>>> {
        self.try_then(|sequence| combinators::batch(sequence, size))
    }

    /// Reads up to `size` elements ahead of the consumer.
    pub fn buffer(self, size: usize) -> SeqResult<Self> {
        self.try_then(|sequence| combinators::buffer(sequence, size))
    }

    pub fn buffer_with(self, config: &BufferConfig) -> SeqResult<Self> {
        self.buffer(config.size)
    }

    pub fn retry<U, P, F>(self, fail_on_give_up: bool, predicate: P, operation: F) -> Enumerable<U>
    where
        T: Clone,
        U: Send + 'static,
        P: FnMut(&SeqError, &T, usize) -> RetryDecision + Send + 'static,
        F: FnMut(T, usize) -> SeqResult<U> + Send + 'static,
    {
        self.then(|sequence| combinators::retry(sequence, fail_on_give_up, predicate, operation))
    }

    pub fn retry_async<U, P, PFut, F, Fut>(
        self,
        fail_on_give_up: bool,
        predicate: P,
        operation: F,
    ) -> Enumerable<U>
    where
        T: Clone,
        U: Send + 'static,
        P: FnMut(&SeqError, &T, usize) -> PFut + Send + 'static,
        PFut: Future<Output = RetryDecision> + Send + 'static,
        F: FnMut(T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<U>> + Send + 'static,
    {
        self.then(|sequence| {
            combinators::retry_async(sequence, fail_on_give_up, predicate, operation)
        })
    }

    pub fn throttle(self, throttle: impl Into<Throttle>) -> Self {
        self.then(|sequence| combinators::throttle(sequence, throttle))
    }

    pub fn interrupt_every(self, count: usize) -> SeqResult<Self> {
        self.try_then(|sequence| combinators::interrupt_every(sequence, count))
    }

    pub fn interrupt_per_second(self, times: u32) -> SeqResult<Self> {
        self.try_then(|sequence| combinators::interrupt_per_second(sequence, times))
    }

    // Parallel transformations

    pub fn parallel_map<U, F, Fut>(
        self,
        concurrency: usize,
        keep_order: bool,
        mapper: F,
    ) -> SeqResult<Enumerable<U>>
    where
        U: Send + 'static,
        F: FnMut(T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<U>> + Send + 'static,
    {
        self.try_then(|sequence| parallel::parallel_map(sequence, concurrency, keep_order, mapper))
    }

    /// Same as [`Enumerable::parallel_map`] with settings read from `config`.
    pub fn parallel_map_with<U, F, Fut>(
        self,
        config: &ParallelConfig,
        mapper: F,
    ) -> SeqResult<Enumerable<U>>
    where
        U: Send + 'static,
        F: FnMut(T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<U>> + Send + 'static,
    {
        self.parallel_map(config.concurrency, config.keep_order, mapper)
    }

    pub fn parallel_filter<F, Fut>(
        self,
        concurrency: usize,
        keep_order: bool,
        predicate: F,
    ) -> SeqResult<Self>
    where
        F: FnMut(&T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<bool>> + Send + 'static,
    {
        self.try_then(|sequence| {
            parallel::parallel_filter(sequence, concurrency, keep_order, predicate)
        })
    }

    pub fn parallel_intercept<F, Fut>(
        self,
        concurrency: usize,
        keep_order: bool,
        action: F,
    ) -> SeqResult<Self>
    where
        F: FnMut(&T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<()>> + Send + 'static,
    {
        self.try_then(|sequence| {
            parallel::parallel_intercept(sequence, concurrency, keep_order, action)
        })
    }

    pub async fn parallel_for_each<F, Fut>(self, concurrency: usize, action: F) -> SeqResult<()>
    where
        F: FnMut(T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<()>> + Send + 'static,
    {
        parallel::parallel_for_each(self.sequence, concurrency, action).await
    }

    pub async fn parallel_group<K, F, Fut>(
        self,
        concurrency: usize,
        selector: F,
    ) -> SeqResult<HashMap<K, Vec<T>>>
    where
        K: Eq + Hash + Send + 'static,
        F: FnMut(&T, usize) -> Fut + Send + 'static,
        Fut: Future<Output = SeqResult<K>> + Send + 'static,
    {
        parallel::parallel_group(self.sequence, concurrency, selector).await
    }

    // Terminal operations

    pub async fn to_vec(self) -> SeqResult<Vec<T>> {
        combinators::to_vec(self.sequence).await
    }

    /// Pulls every element, discarding them, and returns how many were pulled.
    pub async fn drain(self) -> SeqResult<usize> {
        combinators::drain(self.sequence).await
    }

    pub async fn for_each<F>(self, action: F) -> SeqResult<()>
    where
        F: FnMut(T, usize) -> SeqResult<()>,
    {
        combinators::for_each(self.sequence, action).await
    }

    pub async fn for_each_async<F, Fut>(self, action: F) -> SeqResult<()>
    where
        F: FnMut(T, usize) -> Fut,
        Fut: Future<Output = SeqResult<()>>,
    {
        combinators::for_each_async(self.sequence, action).await
    }

    pub async fn reduce<U, F>(self, initial: U, reducer: F) -> SeqResult<U>
    where
        F: FnMut(U, T, usize) -> SeqResult<U>,
    {
        combinators::reduce(self.sequence, initial, reducer).await
    }

    pub async fn any<F>(self, predicate: F) -> SeqResult<bool>
    where
        F: FnMut(&T, usize) -> SeqResult<bool>,
    {
        combinators::any(self.sequence, predicate).await
    }

    pub async fn all<F>(self, predicate: F) -> SeqResult<bool>
    where
        F: FnMut(&T, usize) -> SeqResult<bool>,
    {
        combinators::all(self.sequence, predicate).await
    }

    pub async fn first(self) -> SeqResult<T> {
        combinators::first(self.sequence).await
    }

    pub async fn first_or_default(self, default: T) -> SeqResult<T> {
        combinators::first_or_default(self.sequence, default).await
    }

    pub async fn last(self) -> SeqResult<T> {
        combinators::last(self.sequence).await
    }

    pub async fn last_or_default(self, default: T) -> SeqResult<T> {
        combinators::last_or_default(self.sequence, default).await
    }

    pub async fn single(self) -> SeqResult<T> {
        combinators::single(self.sequence).await
    }

    pub async fn single_or_default(self, default: T) -> SeqResult<T> {
        combinators::single_or_default(self.sequence, default).await
    }

    pub async fn group<K, F>(self, selector: F) -> SeqResult<HashMap<K, Vec<T>>>
    where
        K: Eq + Hash,
        F: FnMut(&T, usize) -> SeqResult<K>,
    {
        combinators::group(self.sequence, selector).await
    }

    pub async fn group_single<K, F>(self, selector: F) -> SeqResult<HashMap<K, T>>
    where
        K: Eq + Hash,
        F: FnMut(&T, usize) -> SeqResult<K>,
    {
        combinators::group_single(self.sequence, selector).await
    }
}

impl<T> Enumerable<T>
where
    T: Clone + Send + 'static,
{
    pub fn pairwise(self) -> Enumerable<(T, T)> {
        self.then(combinators::pairwise)
    }

    /// Splits the pipeline into `count` pipelines that each observe every element.
    pub fn multiplex(self, count: usize, buffer_size: usize) -> SeqResult<Vec<Self>> {
        let outputs = combinators::multiplex(self.sequence, count, buffer_size)?;
        Ok(outputs.into_iter().map(Enumerable::new).collect())
    }
}

impl<T> Enumerable<T>
where
    T: Ord + Send + 'static,
{
    pub fn sort(self) -> Self {
        self.then(combinators::sort)
    }
}

impl<T> From<Sequence<T>> for Enumerable<T> {
    fn from(sequence: Sequence<T>) -> Self {
        Self::new(sequence)
    }
}

impl<T> From<Vec<T>> for Enumerable<T>
where
    T: Send + 'static,
{
    fn from(items: Vec<T>) -> Self {
        Self::new(Sequence::from(items))
    }
}

impl<T> From<Enumerable<T>> for Sequence<T> {
    fn from(enumerable: Enumerable<T>) -> Self {
        enumerable.sequence
    }
}

impl<T> fmt::Debug for Enumerable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enumerable")
            .field("mode", &self.mode())
            .finish()
    }
}
