//! Emulator and environment provisioning flows.
//!
//! These are the jobs an operator runs against a fresh backend before any
//! user starts a session: import an emulator container image, import a disk
//! image as a bootable environment, or create a browser environment.  Image
//! imports are slow backend tasks and go through [`TaskPoller`].

use eaas_core::{
    protocol::messages::{BuiltContainerImage, EnvironmentCreated, ImportedImage},
    ImageReference,
};
use serde_json::{json, Value};
use tracing::info;
use url::Url;

use super::error::ClientError;
use super::task::TaskPoller;
use super::transport::{call, Method, Transport};

/// Reference imported when none is given.
pub const DEFAULT_EMULATOR_IMAGE: &str =
    "registry.gitlab.com/emulation-as-a-service/emulators/qemu-eaas";
/// Disk image imported when none is given.
pub const DEFAULT_DISK_IMAGE: &str =
    "https://github.com/rafaelgieschke/elephan-dos/raw/main/elephan-dos";

const ENVIRONMENTS_PATH: &str = "/environment-repository/environments";
const TEST_PAGE_URL: &str = "http://localhost:8080/contrib/test-webcomponent/test.html";

/// Hardware settings of an imported qemu environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSettings {
    pub soundhw: String,
    /// Memory in MiB.
    pub memory: String,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            soundhw: "ac97".to_string(),
            memory: "1024".to_string(),
        }
    }
}

/// Builds a container image from `image` and registers it as an emulator.
///
/// Returns the built container image.
pub async fn import_emulator(
    poller: &TaskPoller,
    image: &ImageReference,
) -> Result<BuiltContainerImage, ClientError> {
    info!(name = %image.name, tag = %image.tag, "importing emulator");
    let build_path = "/EmilContainerData/buildContainerImage";
    let built: BuiltContainerImage = poller
        .submit(
            build_path,
            json!({
                "urlString": image.name,
                "tag": image.tag,
                "digest": image.digest,
                "containerType": "dockerhub",
            }),
        )
        .await?
        .decode(build_path)?;
    info!(container_url = %built.container_url, "container image built");

    poller
        .submit(
            "/EmilContainerData/importEmulator",
            json!({
                "imageUrl": built.container_url,
                "metadata": built.metadata,
            }),
        )
        .await?;
    info!("done importing emulator");
    Ok(built)
}

/// Imports the disk image at `image_url` and creates a qemu environment
/// booting from it.
///
/// Returns the id of the new environment.
pub async fn import_image_environment(
    poller: &TaskPoller,
    image_url: &str,
    machine: &MachineSettings,
) -> Result<String, ClientError> {
    let label = image_label(image_url)?;
    info!(image_url, label = %label, "importing disk image");

    let import_path = "/environment-repository/actions/import-image";
    let imported: ImportedImage = poller
        .submit(import_path, json!({ "label": label, "url": image_url }))
        .await?
        .decode(import_path)?;
    info!(image_id = %imported.image_id, "disk image imported");

    let template = qemu_environment(&label, &imported.image_id, machine);
    create_environment(poller.transport().as_ref(), template).await
}

/// Creates a browser environment that opens `url`.
///
/// Returns the id of the new environment.
pub async fn create_browser_environment(
    transport: &dyn Transport,
    label: &str,
    url: &str,
) -> Result<String, ClientError> {
    let url = Url::parse(url).map_err(|source| ClientError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    info!(label, url = %url, "creating browser environment");
    create_environment(transport, browser_environment(label, url.as_str())).await
}

/// URL of the test page that starts `env_id` against `api_url`.
pub fn test_page_url(api_url: &str, env_id: &str) -> Result<String, ClientError> {
    let mut url = Url::parse(TEST_PAGE_URL).map_err(|source| ClientError::InvalidUrl {
        url: TEST_PAGE_URL.to_string(),
        source,
    })?;
    let fragment = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("eaasService", api_url)
        .append_pair("envId", env_id)
        .finish();
    url.set_fragment(Some(&fragment));
    Ok(url.to_string())
}

async fn create_environment(transport: &dyn Transport, template: Value) -> Result<String, ClientError> {
    let created: EnvironmentCreated =
        call(transport, Method::Post, ENVIRONMENTS_PATH, Some(template)).await?;
    info!(env_id = %created.id, "environment created");
    Ok(created.id)
}

/// The last path segment of `image_url`.
fn image_label(image_url: &str) -> Result<String, ClientError> {
    let url = Url::parse(image_url).map_err(|source| ClientError::InvalidUrl {
        url: image_url.to_string(),
        source,
    })?;
    Ok(url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default()
        .to_string())
}

fn qemu_environment(label: &str, image_id: &str, machine: &MachineSettings) -> Value {
    json!({
        "label": label,
        "templateId": "qemu-x86",
        "nativeConfig": format!(
            "-vga cirrus -smp 1 -net nic,model=rtl8139 -soundhw {} -m {} -usb -usbdevice tablet",
            machine.soundhw, machine.memory
        ),
        "driveSettings": [{
            "driveIndex": 2,
            "imageId": image_id,
            "imageArchive": "default",
            "drive": {
                "iface": "ide",
                "bus": "0",
                "unit": "0",
                "type": "disk",
                "boot": true,
                "plugged": false,
            },
        }],
        "operatingSystemId": "os:linux:ubuntu",
        "enableNetwork": false,
        "enableInternet": false,
        "useWebRTC": true,
        "useXpra": true,
    })
}

fn browser_environment(label: &str, url: &str) -> Value {
    json!({
        "label": label,
        "templateId": "browser",
        "nativeConfig": format!(
            "--disable-background-mode --always-authorize-plugins --allow-outdated-plugins \
             --proxy-server=socks5://127.0.0.1:8090 --window-size=1024,768 {url}"
        ),
        "driveSettings": [],
        "operatingSystemId": "os:other:chrome-53",
        "enableNetwork": true,
        "enableInternet": true,
        "useWebRTC": true,
        "useXpra": true,
        "xpraEncoding": "jpeg",
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
