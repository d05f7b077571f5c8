//! Function wrapper that records or checks every call
//!
//! `Regression` holds the original callable next to its identity and
//! per-function options. Calling through it runs the original, then hands
//! the encoded arguments and result to a `Recorder`. The original stays
//! reachable through `Regression::original()` so replay tooling can run it
//! without recording anything.
//!
//! ```ignore
//! fn add(a: i64, b: i64) -> i64 { a + b }
//!
//! let add_checked = regression!(|(a, b): (i64, i64)| add(a, b), "add");
//! let sum = add_checked.call(&recorder, (1, 2))?;
//! ```

use std::fmt;
use std::sync::Arc;

use regrest_core::{Decode, Encode, Encoder, TypeRegistry};

use crate::args::CallArgs;
use crate::error::EngineResult;
use crate::recorder::{CheckOptions, Outcome, Recorder};

/// A function under regression test
pub struct Regression<F> {
    module: String,
    function: String,
    func: Arc<F>,
    options: CheckOptions,
}

impl<F> Clone for Regression<F> {
    fn clone(&self) -> Self {
        Regression {
            module: self.module.clone(),
            function: self.function.clone(),
            func: Arc::clone(&self.func),
            options: self.options,
        }
    }
}

impl<F> fmt::Debug for Regression<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regression")
            .field("module", &self.module)
            .field("function", &self.function)
            .field("options", &self.options)
            .finish()
    }
}

impl<F> Regression<F> {
    /// Wrap `func`, identified by `module` and `function`
    pub fn new(module: impl Into<String>, function: impl Into<String>, func: F) -> Self {
        Regression {
            module: module.into(),
            function: function.into(),
            func: Arc::new(func),
            options: CheckOptions::default(),
        }
    }

    /// Float tolerance for this function
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.options.tolerance = Some(tolerance);
        self
    }

    /// Always overwrite this function's records
    pub fn update(mut self, update: bool) -> Self {
        self.options.update = update;
        self
    }

    /// Return regressions of this function as errors
    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.options.raise_on_error = Some(raise);
        self
    }

    /// The unwrapped function
    pub fn original(&self) -> &F {
        &self.func
    }

    pub(crate) fn shared(&self) -> Arc<F> {
        Arc::clone(&self.func)
    }

    /// Module path the function is recorded under
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Function name the function is recorded under
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Per-function options
    pub fn options(&self) -> CheckOptions {
        self.options
    }

    /// Run the function and check its result; returns the result
    ///
    /// A regression only becomes an error when `raise_on_error` is in
    /// effect; otherwise it is logged and the fresh result is returned.
    pub fn call<A, R>(&self, recorder: &Recorder, args: A) -> EngineResult<R>
    where
        F: Fn(A) -> R,
        A: CallArgs,
        R: Encode + Decode,
    {
        self.run(recorder, args).map(|(result, _)| result)
    }

    /// Like `call`, but also returns what the recorder did
    pub fn run<A, R>(&self, recorder: &Recorder, args: A) -> EngineResult<(R, Outcome)>
    where
        F: Fn(A) -> R,
        A: CallArgs,
        R: Encode + Decode,
    {
        let mut types = TypeRegistry::new();
        A::register(&mut types);
        R::register(&mut types);
        recorder.store().extend_registry(&types);

        let mut encoder = Encoder::new(recorder.config().limits());
        let mut call = recorder.call(self.module.clone(), self.function.clone());
        call.args = args.encode_args(&mut encoder)?;

        let result = (*self.func)(args);
        let encoded = encoder.encode(&result)?;
        let outcome = recorder.check(&call, &encoded, self.options)?;
        Ok((result, outcome))
    }
}

/// Wrap a function under its call-site module path
///
/// `regression!(func)` names the record after the function;
/// `regression!(expr, "name")` names it explicitly.
#[macro_export]
macro_rules! regression {
    ($func:ident) => {
        $crate::Regression::new(module_path!(), stringify!($func), $func)
    };
    ($func:expr, $name:expr) => {
        $crate::Regression::new(module_path!(), $name, $func)
    };
}
