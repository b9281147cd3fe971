mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;
pub use response::ResponseHeader;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

mod options;
pub use options::ConnectionOptions;

mod range;
pub use range::ByteRange;
pub use range::RangeUnit;
pub use range::Ranges;

mod query;
pub use query::QueryParams;

mod uri;
pub use uri::userinfo;
pub use uri::UriView;

mod content;
pub use content::form_decoder;
pub use content::ContentDecoder;
pub use content::DecodedContent;
pub use content::FormData;

mod info;
pub use info::RequestInfo;

pub mod body;
