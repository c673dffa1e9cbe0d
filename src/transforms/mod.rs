//! The stage library: every record transform the task pipes compose.

pub mod convert;
pub mod optimize;
pub mod picture;
pub mod purge;
pub mod rename;
pub mod sprite;

pub use convert::{ImageConverter, ImgFormat, ProfileOverrides, Resize};
pub use optimize::ImageOptimizer;
pub use picture::PictureTagRewriter;
pub use purge::CssUnusedRulePurger;
pub use rename::FileRenamer;
pub use sprite::SvgSpriteBuilder;
