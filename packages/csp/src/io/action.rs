// deferred synchronous actions.

use std::fmt::{self, Formatter, Debug};


/// A unit of work that is performed synchronously when invoked
///
/// Composing actions with [`bind`](Self::bind) and [`then`](Self::then) performs nothing; the
/// composed action runs on whichever thread eventually calls [`perform`](Self::perform).
pub struct Io<T>(Box<dyn FnOnce() -> T + Send + 'static>);

impl<T: 'static> Io<T> {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Io(Box::new(f))
    }

    /// Action that performs nothing and produces `value`.
    pub fn unit(value: T) -> Self
    where
        T: Send,
    {
        Io::new(move || value)
    }

    /// Run the action.
    pub fn perform(self) -> T {
        (self.0)()
    }

    /// Action that performs `self`, feeds its output to `f`, and performs the resulting action.
    pub fn bind<U, F>(self, f: F) -> Io<U>
    where
        U: 'static,
        F: FnOnce(T) -> Io<U> + Send + 'static,
    {
        Io::new(move || f(self.perform()).perform())
    }

    /// Action that performs `self`, discards its output, then performs `next`.
    pub fn then<U: 'static>(self, next: Io<U>) -> Io<U> {
        self.bind(move |_| next)
    }

    /// Action that performs `self` and transforms its output with `f`.
    pub fn map<U, F>(self, f: F) -> Io<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Io::new(move || f(self.perform()))
    }
}

impl<T: 'static, E: 'static> Io<Result<T, E>> {
    /// Action that performs `self`, and if it fails, performs the action `handler` makes from the
    /// error instead.
    pub fn or_else<E2, F>(self, handler: F) -> Io<Result<T, E2>>
    where
        E2: 'static,
        F: FnOnce(E) -> Io<Result<T, E2>> + Send + 'static,
    {
        Io::new(move || match self.perform() {
            Ok(value) => Ok(value),
            Err(e) => handler(e).perform(),
        })
    }
}

impl<T> Debug for Io<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("Io(..)")
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering::SeqCst},
    };

    #[test]
    fn bind() {
        let action = Io::unit(40).bind(|x| Io::unit(x + 2));
        assert_eq!(action.perform(), 42);
    }

    #[test]
    fn composing_performs_nothing() {
        let ran = Arc::new(AtomicBool::new(false));
        let action = {
            let ran = Arc::clone(&ran);
            Io::new(move || ran.store(true, SeqCst)).then(Io::unit("done"))
        };
        assert!(!ran.load(SeqCst));
        assert_eq!(action.perform(), "done");
        assert!(ran.load(SeqCst));
    }

    #[test]
    fn or_else_recovers() {
        #[derive(Debug)]
        struct MyError(String);

        let action = Io::new(|| Err::<String, _>(MyError("foo".to_owned())))
            .or_else(|MyError(msg)| Io::unit(Ok::<_, ()>(msg)));
        assert_eq!(action.perform(), Ok("foo".to_owned()));

        let action = Io::unit(Ok::<_, MyError>(1)).or_else(|_| Io::unit(Ok::<_, ()>(2)));
        assert_eq!(action.perform(), Ok(1));
    }
}
