//! Result envelopes and how the offline commands print them.

use std::io::{self, Write};
use std::time::Instant;

use clap::ValueEnum;
use quill::QuillError;
use quill_protocol::{Envelope, EnvelopeError, ErrorCode};
use serde::Serialize;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON
	#[default]
	Json,
	/// One compact JSON line per result
	Ndjson,
	/// Human-readable text
	Text,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"json" => Ok(OutputFormat::Json),
			"ndjson" => Ok(OutputFormat::Ndjson),
			"text" => Ok(OutputFormat::Text),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

/// Builder for [`Envelope`]s; the duration is measured from construction.
pub struct ResultBuilder<T: Serialize> {
	op: String,
	data: Option<T>,
	error: Option<EnvelopeError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(op: impl Into<String>) -> Self {
		Self::started_at(op, Instant::now())
	}

	pub fn started_at(op: impl Into<String>, start_time: Instant) -> Self {
		Self {
			op: op.into(),
			data: None,
			error: None,
			start_time,
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(EnvelopeError {
			code,
			message: message.into(),
			details: None,
		});
		self
	}

	pub fn failure(mut self, err: &QuillError) -> Self {
		self.error = Some(EnvelopeError {
			code: err.code(),
			message: err.to_string(),
			details: err.details(),
		});
		self
	}

	pub fn build(self) -> Envelope<T> {
		Envelope {
			ok: self.error.is_none() && self.data.is_some(),
			op: self.op,
			data: self.data,
			error: self.error,
			duration_ms: Some(self.start_time.elapsed().as_millis() as u64),
		}
	}
}

/// Prints an envelope to stdout; `text` renders successful data with `render`.
pub fn print_result<T: Serialize>(envelope: &Envelope<T>, format: OutputFormat, render: impl Fn(&T) -> String) -> io::Result<()> {
	let mut stdout = io::stdout().lock();
	match format {
		OutputFormat::Json => {
			let json = serde_json::to_string_pretty(envelope).map_err(io::Error::other)?;
			writeln!(stdout, "{json}")
		}
		OutputFormat::Ndjson => {
			let json = serde_json::to_string(envelope).map_err(io::Error::other)?;
			writeln!(stdout, "{json}")
		}
		OutputFormat::Text => match (&envelope.data, &envelope.error) {
			(_, Some(error)) => writeln!(stdout, "error [{}]: {}", error.code, error.message),
			(Some(data), None) => writeln!(stdout, "{}", render(data)),
			(None, None) => writeln!(stdout, "{}: no result", envelope.op),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_marks_failures() {
		let ok = ResultBuilder::new("sessions.list").data(3).build();
		assert!(ok.ok);
		assert_eq!(ok.data, Some(3));

		let failed = ResultBuilder::<()>::new("session.verify")
			.failure(&QuillError::SessionNotFound("abc".into()))
			.build();
		assert!(!failed.ok);
		let error = failed.error.unwrap();
		assert_eq!(error.code, ErrorCode::SessionNotFound);
		assert!(error.message.contains("abc"));
	}

	#[test]
	fn format_round_trips_through_strings() {
		for format in [OutputFormat::Json, OutputFormat::Ndjson, OutputFormat::Text] {
			assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
		}
		assert!("yaml".parse::<OutputFormat>().is_err());
	}
}
