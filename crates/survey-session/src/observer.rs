use survey_spec::ResponseData;

/// Host notifications. Both hooks default to doing nothing.
pub trait SessionObserver: Send + Sync {
    fn on_complete(&self, _responses: &ResponseData) {}

    fn on_error(&self, _message: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

type CompleteFn = Box<dyn Fn(&ResponseData) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&str) + Send + Sync>;

/// Closure-backed observer.
#[derive(Default)]
pub struct Callbacks {
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_complete(
        mut self,
        callback: impl Fn(&ResponseData) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn with_on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl SessionObserver for Callbacks {
    fn on_complete(&self, responses: &ResponseData) {
        if let Some(callback) = &self.on_complete {
            callback(responses);
        }
    }

    fn on_error(&self, message: &str) {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn callbacks_forward_to_closures() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let errors = seen.clone();
        let observer = Callbacks::new().with_on_error(move |message| {
            errors.lock().expect("lock").push(message.to_string());
        });
        observer.on_error("offline");
        observer.on_complete(&ResponseData::new());
        assert_eq!(*seen.lock().expect("lock"), vec!["offline".to_string()]);
    }
}
