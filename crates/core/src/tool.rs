//! Tool call supports.

mod error;
mod registry;
mod schema;

use std::marker::PhantomData;

use futures_util::future::BoxFuture;
use schemars::{JsonSchema, schema_for};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub(crate) use registry::Registry;

/// The result of a tool call.
pub type ToolResult = Result<Value, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as the data directory of the
/// agent. To do this, make the context an immutable state of the tool, which
/// can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned + Send;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the name shown to users, the same as [`name`](Self::name)
    /// by default.
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Returns a prompt if the user must consent to running the tool with
    /// the given input.
    fn consent(&self, _input: &Self::Input) -> Option<String> {
        None
    }

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`.
    /// The future is not polled before the user consented.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// Metadata of a registered tool.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolInfo {
    /// Unique name, as seen by the model.
    pub name: String,
    /// Name shown to users.
    pub display_name: String,
    /// Description for the model.
    pub description: String,
    /// Normalised JSON schema of the parameters.
    pub parameters: Value,
}

pub(crate) struct PreparedCall {
    pub consent: Option<String>,
    pub run: BoxFuture<'static, ToolResult>,
}

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn prepare(&self, arguments: Value) -> Result<PreparedCall, Error>;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn display_name(&self) -> &str {
        self.0.display_name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn prepare(&self, arguments: Value) -> Result<PreparedCall, Error> {
        let input: T::Input = serde_json::from_value(arguments)
            .map_err(|err| Error::invalid_input().with_reason(format!("{err}")))?;
        Ok(PreparedCall {
            consent: self.0.consent(&input),
            run: Box::pin(self.0.execute(input)),
        })
    }
}

/// Returns the JSON schema of `T`, for use as a tool parameter schema.
#[inline]
pub fn parameters_of<T: JsonSchema>() -> Value {
    schema_for!(T).to_value()
}

/// A tool made of a plain function, see [`tool_fn`].
pub struct FnTool<I, F> {
    name: String,
    description: String,
    parameter_schema: Value,
    f: F,
    _input: PhantomData<fn(I)>,
}

/// Creates a tool from a function.
///
/// The parameter schema is derived from the input type.
///
/// # Examples
///
/// ```
/// use agentia_core::tool::{self, tool_fn};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Weather {
///     location: String,
/// }
///
/// let tool = tool_fn("get_weather", "Gets the weather", |w: Weather| async move {
///     Ok::<_, tool::Error>(json!({ "location": w.location, "temperature": 72 }))
/// });
/// ```
pub fn tool_fn<I, F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    f: F,
) -> FnTool<I, F>
where
    I: JsonSchema + DeserializeOwned + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    FnTool {
        name: name.into(),
        description: description.into(),
        parameter_schema: parameters_of::<I>(),
        f,
        _input: PhantomData,
    }
}

impl<I, F, Fut> Tool for FnTool<I, F>
where
    I: JsonSchema + DeserializeOwned + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    type Input = I;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        (self.f)(input)
    }
}

/// Creates a tool result from a serializable value.
#[inline]
pub fn to_result<T: Serialize>(value: &T) -> ToolResult {
    serde_json::to_value(value)
        .map_err(|err| Error::execution_error().with_reason(format!("{err}")))
}
