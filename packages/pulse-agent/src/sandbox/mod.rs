//! Restricted Starlark runtime for synthesized pipelines.
//!
//! A program sees only the Starlark standard library, `print`, `json`, and the functions
//! registered by [`facade`] and [`helpers`]. It has no filesystem, network, or `load`, and the
//! dialect has no `while`.

mod convert;
mod facade;
mod helpers;

pub use facade::Capabilities;

use std::{
	future::Future,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use starlark::{
	PrintHandler,
	any::ProvidesStaticType,
	codemap::FileSpanRef,
	environment::{Globals, GlobalsBuilder, LibraryExtension, Module},
	eval::{BeforeStmtFuncDyn, Evaluator},
	syntax::{AstModule, Dialect},
};
use tokio::runtime::Handle;

use crate::{ConsoleSink, ExecutionError, ResultEnvelope, cutoff};

pub const MODULE_NAME: &str = "pipeline.star";
pub const RESULT_BINDING: &str = "final_answer";

/// Set when the coordinator abandons an execution.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);
impl CancelFlag {
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Everything a running pipeline can reach.
#[derive(ProvidesStaticType)]
pub struct SandboxContext {
	capabilities: Capabilities,
	runtime: Handle,
	console: Arc<ConsoleSink>,
	cancel: CancelFlag,
}
impl SandboxContext {
	pub fn new(
		capabilities: Capabilities,
		runtime: Handle,
		console: Arc<ConsoleSink>,
		cancel: CancelFlag,
	) -> Self {
		Self { capabilities, runtime, console, cancel }
	}

	pub fn cancel_flag(&self) -> &CancelFlag {
		&self.cancel
	}

	fn check_cancelled(&self) -> anyhow::Result<()> {
		if self.cancel.is_cancelled() {
			anyhow::bail!("Pipeline execution was cancelled after exceeding its time limit.");
		}

		Ok(())
	}

	/// Runs an async capability call to completion on the worker thread.
	fn block_on<T, F>(&self, fut: F) -> anyhow::Result<T>
	where
		F: Future<Output = crate::Result<T>>,
	{
		self.check_cancelled()?;

		let out = self.runtime.block_on(fut)?;

		self.check_cancelled()?;

		Ok(out)
	}

	fn dynamic_cutoff(
		&self,
		query: &str,
		hits: Vec<pulse_storage::SearchHit>,
		min_keep: Option<usize>,
		drop_ratio: Option<f64>,
	) -> anyhow::Result<Vec<pulse_storage::SearchHit>> {
		self.check_cancelled()?;

		let params = self.capabilities.cutoff.clone().with_overrides(min_keep, drop_ratio);
		let kept = cutoff::dynamic_cutoff(query, hits, &params, |request| {
			self.runtime.block_on(self.capabilities.complete(&request))
		});

		self.check_cancelled()?;

		Ok(kept)
	}
}

struct ConsolePrinter<'a> {
	context: &'a SandboxContext,
}
impl PrintHandler for ConsolePrinter<'_> {
	fn println(&self, text: &str) -> starlark::Result<()> {
		let cancel = &self.context.cancel;

		if !self.context.console.write_line_if(text, || !cancel.is_cancelled()) {
			return Err(anyhow::anyhow!("Console is closed for a cancelled pipeline.").into());
		}

		Ok(())
	}
}

/// Stops an abandoned pipeline at its next statement.
struct StatementGuard {
	cancel: CancelFlag,
}
impl<'a, 'e: 'a> BeforeStmtFuncDyn<'a, 'e> for StatementGuard {
	fn call<'v>(
		&mut self,
		_span: FileSpanRef,
		_eval: &mut Evaluator<'v, 'a, 'e>,
	) -> starlark::Result<()> {
		if self.cancel.is_cancelled() {
			return Err(anyhow::anyhow!(
				"Pipeline execution was cancelled after exceeding its time limit."
			)
			.into());
		}

		Ok(())
	}
}

/// Parses and runs `source`, then decodes and validates its `final_answer` binding.
///
/// Blocks the calling thread; run it on a blocking worker.
pub fn execute(source: &str, context: &SandboxContext) -> Result<ResultEnvelope, ExecutionError> {
	let mut dialect = Dialect::Extended.clone();

	dialect.enable_f_strings = true;

	let ast = AstModule::parse(MODULE_NAME, source.to_string(), &dialect).map_err(fault)?;
	let globals = globals();
	let module = Module::new();
	let printer = ConsolePrinter { context };

	{
		let mut eval = Evaluator::new(&module);

		eval.extra = Some(context);
		eval.set_print_handler(&printer);
		let guard: Box<dyn BeforeStmtFuncDyn> =
			Box::new(StatementGuard { cancel: context.cancel.clone() });

		eval.before_stmt_for_dap(guard.into());
		eval.eval_module(ast, &globals).map_err(fault)?;
	}

	let value = module.get(RESULT_BINDING).ok_or_else(ExecutionError::missing_output)?;
	let json = value.to_json_value().map_err(|err| {
		ExecutionError::invalid_output(format!("final_answer is not JSON-compatible: {err}"))
	})?;

	ResultEnvelope::from_pipeline_value(json)
}

/// Runs [`execute`] on a blocking worker under a wall-clock limit.
///
/// When the limit passes the context's cancel flag is set and a timeout error is returned. The
/// abandoned worker then fails at its next statement, capability call, or print.
pub async fn execute_with_timeout(
	source: String,
	context: SandboxContext,
	limit: Duration,
) -> Result<ResultEnvelope, ExecutionError> {
	let cancel = context.cancel_flag().clone();
	let task = tokio::task::spawn_blocking(move || execute(&source, &context));

	match tokio::time::timeout(limit, task).await {
		Ok(Ok(result)) => result,
		Ok(Err(err)) => Err(ExecutionError::fault(format!("Sandbox worker failed: {err}"), "")),
		Err(_) => {
			cancel.cancel();

			tracing::warn!(limit_ms = limit.as_millis() as u64, "Pipeline execution timed out.");

			Err(ExecutionError::timed_out(limit))
		},
	}
}

fn globals() -> Globals {
	GlobalsBuilder::extended_by(&[LibraryExtension::Print, LibraryExtension::Json])
		.with(facade::register)
		.with(helpers::register)
		.build()
}

/// Splits a rendered Starlark diagnostic into its `error:` line and the remaining trace.
fn fault(err: starlark::Error) -> ExecutionError {
	let rendered = err.to_string();
	let lines: Vec<&str> = rendered.lines().collect();
	let message_idx = lines
		.iter()
		.position(|line| line.trim_start().starts_with("error:"))
		.unwrap_or(0);
	let message = lines.get(message_idx).map(|line| line.trim()).unwrap_or("Pipeline failed.");
	let trace = lines
		.iter()
		.enumerate()
		.filter(|(idx, _)| *idx != message_idx)
		.map(|(_, line)| *line)
		.collect::<Vec<_>>()
		.join("\n");

	ExecutionError::fault(message, trace.trim_end())
}
