//! # rbook-fetch
//! - Repository: <https://github.com/DevinSterling/rbook>
//!
//! Lazy, range-readable access to the resources of an ebook:
//! ZIP and directory containers, composable resource decorators,
//! and decryption of DRM-protected entries.
//!
//! # Modules
//! - [`resource`]: The [`Resource`] handle along with its backing stores and decorators.
//! - [`container`]: The [`Container`] abstraction and routing between containers.
//! - [`archive`]: ZIP and exploded archive containers, and the openers producing them.
//! - [`drm`]: Transparent decryption of protected resources.
//! - [`errors`]: The error types reported across the crate.
//!
//! # Examples
//! Opening an archive and reading part of an entry:
//! ```no_run
//! # use rbook_fetch::{Container, Resource, ResourceExt};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // A directory opens as an exploded archive, anything else as a ZIP file
//! let container = rbook_fetch::archive::open_container("moby-dick.epub")?;
//!
//! let mimetype = container.get("mimetype").unwrap();
//! assert_eq!("application/epub+zip", mimetype.read_as_string().await?);
//!
//! // Only the first kilobyte is decompressed
//! let chapter = container.get("OPS/chapter_001.xhtml").unwrap();
//! let head = chapter.read(Some(0..1024)).await?;
//!
//! container.close().await;
//! # Ok(())
//! # }
//! ```
//! Decorating a resource:
//! ```
//! # use rbook_fetch::resource::{BufferResource, CachingResource, Resource, TransformingResource};
//! # use rbook_fetch::errors::ReadResult;
//! # use bytes::Bytes;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ReadResult<()> {
//! let uppercase = |content: Bytes| -> ReadResult<Bytes> {
//!     Ok(Bytes::from(content.to_ascii_uppercase()))
//! };
//! let resource = BufferResource::new("chapter one").with_href("c1.txt");
//! let resource = CachingResource::new(TransformingResource::new(resource, uppercase));
//!
//! assert_eq!(Some("c1.txt"), resource.href());
//! assert_eq!(&b"ONE"[..], resource.read(Some(8..11)).await?);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod container;
pub mod drm;
pub mod errors;
mod media_type;
pub mod resource;
mod util;

pub use self::container::{Container, ContainerExt};
pub use self::media_type::MediaType;
pub use self::resource::{Resource, ResourceExt};
pub use self::util::uri::RelativeUrl;
