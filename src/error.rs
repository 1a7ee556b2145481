use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the metadata store")]
    Store,
    #[display("could not prepare the upload transport")]
    Transport,
    #[display("could not read {_0}")]
    Input(#[error(not(source))] String),
    #[display("{_0} failed")]
    Command(#[error(not(source))] &'static str),
    #[display("could not write output")]
    Output,
}
