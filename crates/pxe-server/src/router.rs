//! Virtual file routing for TFTP.
//!
//! Boot paths requested over TFTP do not map onto a single directory: the
//! pxelinux menu is generated, kernels and bootloaders come from the host's
//! install locations, and the iPXE ROM may live anywhere. Routes are tried
//! in order and the first match wins:
//!
//! 1. the pxelinux config path, answered with a generated menu
//! 2. the kernel prefix, mapped onto `kernel_path_prefix`
//! 3. the bootloader prefix, mapped onto `pxe_path_prefix`
//! 4. the iPXE ROM name, mapped onto `ipxe_rom_path` (if configured)
//! 5. the root directory fallback (if configured)

use crate::config::{PxeMenu, RouteConfig};
use crate::error::RouteError;
use bytes::Bytes;
use futures::io::{AsyncRead, Cursor};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio_util::compat::TokioAsyncReadCompatExt;

/// What a request path resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    Generated(Bytes),
    File(PathBuf),
}

/// An opened boot file and its length in bytes.
///
/// The reader implements the `futures` I/O traits so it can be handed
/// straight to the TFTP transfer.
pub struct BootFile {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub size: u64,
}

impl fmt::Debug for BootFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootFile").field("size", &self.size).finish_non_exhaustive()
    }
}

/// Maps TFTP request paths onto generated content or files on disk.
#[derive(Debug, Clone)]
pub struct VirtualFileRouter {
    routes: RouteConfig,
    menu: Bytes,
}

impl VirtualFileRouter {
    /// Creates a router, rendering the pxelinux menu once up front.
    pub fn new(routes: RouteConfig, menu: &PxeMenu) -> Self {
        Self {
            routes,
            menu: Bytes::from(render_menu(menu)),
        }
    }

    /// Maps a request path onto its content without touching the disk.
    pub fn resolve(&self, path: &str) -> Result<RouteTarget, RouteError> {
        let path = path.trim_start_matches('/');
        if path.contains(['\\', '\0']) {
            return Err(RouteError::Forbidden(path.to_string()));
        }

        let routes = &self.routes;
        if path == routes.pxe_config_path {
            return Ok(RouteTarget::Generated(self.menu.clone()));
        }
        if let Some(rest) = path.strip_prefix(routes.kernel_prefix.as_str()) {
            return confine(&routes.kernel_path_prefix, rest).map(RouteTarget::File);
        }
        if let Some(rest) = path.strip_prefix(routes.pxe_prefix.as_str()) {
            return confine(&routes.pxe_path_prefix, rest).map(RouteTarget::File);
        }
        if path == routes.ipxe_rom_name {
            if let Some(rom) = &routes.ipxe_rom_path {
                return Ok(RouteTarget::File(rom.clone()));
            }
        }
        if let Some(root) = &routes.root_dir {
            return confine(root, path).map(RouteTarget::File);
        }

        Err(RouteError::NotFound(path.to_string()))
    }

    /// Resolves `path` and opens it for reading.
    pub async fn open(&self, path: &str) -> Result<BootFile, RouteError> {
        match self.resolve(path)? {
            RouteTarget::Generated(content) => Ok(BootFile {
                size: content.len() as u64,
                reader: Box::new(Cursor::new(content)),
            }),
            RouteTarget::File(file_path) => {
                let file = tokio::fs::File::open(&file_path)
                    .await
                    .map_err(|e| open_error(&file_path, e))?;
                let metadata = file.metadata().await.map_err(|e| open_error(&file_path, e))?;
                if !metadata.is_file() {
                    return Err(RouteError::NotFound(file_path.display().to_string()));
                }
                Ok(BootFile {
                    size: metadata.len(),
                    reader: Box::new(file.compat()),
                })
            }
        }
    }
}

/// Joins `rest` onto `base`, refusing any segment that would climb out.
fn confine(base: &Path, rest: &str) -> Result<PathBuf, RouteError> {
    let mut joined = base.to_path_buf();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(RouteError::Forbidden(rest.to_string())),
            segment => joined.push(segment),
        }
    }
    Ok(joined)
}

fn open_error(path: &Path, source: std::io::Error) -> RouteError {
    if source.kind() == ErrorKind::NotFound {
        RouteError::NotFound(path.display().to_string())
    } else {
        RouteError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// pxelinux menu with a single default entry.
pub fn render_menu(menu: &PxeMenu) -> String {
    format!(
        "default linux\n\nlabel linux\n  kernel {}\n  append initrd={} {}\n",
        menu.kernel, menu.initrd, menu.cmdline
    )
}
