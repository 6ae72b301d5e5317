pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Validation(String),
	#[error("Missing column: {0}.")]
	MissingColumn(String),
	#[error("Record {record}: {source}")]
	Row { record: usize, source: csv::Error },
	#[error(transparent)]
	Csv(#[from] csv::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Provider(#[from] pulse_providers::Error),
	#[error(transparent)]
	Storage(#[from] pulse_storage::Error),
}
