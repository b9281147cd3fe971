mod head_decoder;
pub use head_decoder::RequestHeadDecoder;
pub use head_decoder::ResponseHeadDecoder;

mod head_encoder;
pub use head_encoder::RequestHeadEncoder;
pub use head_encoder::ResponseHeadEncoder;
