//! Statically enumerated aria2 method surface.
//!
//! Each remote call is a thin typed wrapper over
//! [`Connection::send_request`]. Responses with a small, stable shape get a
//! typed struct; aria2's larger status objects stay as raw JSON since their
//! fields vary across versions and options.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::client::{CallOptions, Connection, Subscription};
use super::error::RpcError;

/// Response of `aria2.getVersion`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub enabled_features: Vec<String>,
}

/// Response of `aria2.getGlobalStat`. aria2 reports every number as a
/// decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStat {
    pub download_speed: String,
    pub upload_speed: String,
    pub num_active: String,
    pub num_waiting: String,
    pub num_stopped: String,
    pub num_stopped_total: String,
}

impl Connection {
    /// Invoke an arbitrary method with default call options.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.send_request(CallOptions::default(), method, params)
            .await
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    // Download control.

    /// Add a download from one or more URIs pointing at the same resource.
    /// Returns the gid of the new download.
    pub async fn add_uri(
        &self,
        uris: Vec<String>,
        options: Option<Value>,
    ) -> Result<String, RpcError> {
        let mut params = vec![json!(uris)];
        if let Some(options) = options {
            params.push(options);
        }
        self.call_typed("aria2.addUri", params).await
    }

    /// Add a download from a base64-encoded `.torrent` file. Returns the gid
    /// of the new download.
    pub async fn add_torrent(
        &self,
        torrent: String,
        options: Option<Value>,
    ) -> Result<String, RpcError> {
        let mut params = vec![json!(torrent)];
        if let Some(options) = options {
            // The options slot comes after the (here empty) web-seed URI list.
            params.push(json!([]));
            params.push(options);
        }
        self.call_typed("aria2.addTorrent", params).await
    }

    /// Add downloads from a base64-encoded `.metalink` file. A metalink can
    /// describe several files, so this returns one gid per download.
    pub async fn add_metalink(
        &self,
        metalink: String,
        options: Option<Value>,
    ) -> Result<Vec<String>, RpcError> {
        let mut params = vec![json!(metalink)];
        if let Some(options) = options {
            params.push(options);
        }
        self.call_typed("aria2.addMetalink", params).await
    }

    pub async fn remove(&self, gid: &str) -> Result<String, RpcError> {
        self.call_typed("aria2.remove", vec![json!(gid)]).await
    }

    pub async fn force_remove(&self, gid: &str) -> Result<String, RpcError> {
        self.call_typed("aria2.forceRemove", vec![json!(gid)]).await
    }

    pub async fn pause(&self, gid: &str) -> Result<String, RpcError> {
        self.call_typed("aria2.pause", vec![json!(gid)]).await
    }

    pub async fn force_pause(&self, gid: &str) -> Result<String, RpcError> {
        self.call_typed("aria2.forcePause", vec![json!(gid)]).await
    }

    pub async fn pause_all(&self) -> Result<Value, RpcError> {
        self.call("aria2.pauseAll", vec![]).await
    }

    pub async fn force_pause_all(&self) -> Result<Value, RpcError> {
        self.call("aria2.forcePauseAll", vec![]).await
    }

    pub async fn unpause(&self, gid: &str) -> Result<String, RpcError> {
        self.call_typed("aria2.unpause", vec![json!(gid)]).await
    }

    pub async fn unpause_all(&self) -> Result<Value, RpcError> {
        self.call("aria2.unpauseAll", vec![]).await
    }

    // Introspection.

    pub async fn tell_status(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("aria2.tellStatus", vec![json!(gid)]).await
    }

    pub async fn tell_active(&self) -> Result<Value, RpcError> {
        self.call("aria2.tellActive", vec![]).await
    }

    pub async fn tell_waiting(&self, offset: i64, num: i64) -> Result<Value, RpcError> {
        self.call("aria2.tellWaiting", vec![json!(offset), json!(num)])
            .await
    }

    pub async fn tell_stopped(&self, offset: i64, num: i64) -> Result<Value, RpcError> {
        self.call("aria2.tellStopped", vec![json!(offset), json!(num)])
            .await
    }

    pub async fn get_files(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("aria2.getFiles", vec![json!(gid)]).await
    }

    pub async fn get_uris(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("aria2.getUris", vec![json!(gid)]).await
    }

    pub async fn get_peers(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("aria2.getPeers", vec![json!(gid)]).await
    }

    pub async fn get_servers(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("aria2.getServers", vec![json!(gid)]).await
    }

    /// Replace URIs of one file inside a download: `del_uris` are removed
    /// first, then `add_uris` appended. Returns `[deleted, added]` counts.
    pub async fn change_uri(
        &self,
        gid: &str,
        file_index: i64,
        del_uris: Vec<String>,
        add_uris: Vec<String>,
    ) -> Result<Value, RpcError> {
        self.call(
            "aria2.changeUri",
            vec![json!(gid), json!(file_index), json!(del_uris), json!(add_uris)],
        )
        .await
    }

    /// Move a download in the waiting queue. `how` is one of `POS_SET`,
    /// `POS_CUR`, `POS_END`. Returns the resulting position.
    pub async fn change_position(
        &self,
        gid: &str,
        pos: i64,
        how: &str,
    ) -> Result<i64, RpcError> {
        self.call_typed("aria2.changePosition", vec![json!(gid), json!(pos), json!(how)])
            .await
    }

    // Options and session state.

    pub async fn get_option(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("aria2.getOption", vec![json!(gid)]).await
    }

    pub async fn change_option(&self, gid: &str, options: Value) -> Result<Value, RpcError> {
        self.call("aria2.changeOption", vec![json!(gid), options])
            .await
    }

    pub async fn get_global_option(&self) -> Result<Value, RpcError> {
        self.call("aria2.getGlobalOption", vec![]).await
    }

    pub async fn change_global_option(&self, options: Value) -> Result<Value, RpcError> {
        self.call("aria2.changeGlobalOption", vec![options]).await
    }

    pub async fn get_session_info(&self) -> Result<Value, RpcError> {
        self.call("aria2.getSessionInfo", vec![]).await
    }

    pub async fn get_global_stat(&self) -> Result<GlobalStat, RpcError> {
        self.call_typed("aria2.getGlobalStat", vec![]).await
    }

    pub async fn get_version(&self) -> Result<VersionInfo, RpcError> {
        self.call_typed("aria2.getVersion", vec![]).await
    }

    pub async fn save_session(&self) -> Result<Value, RpcError> {
        self.call("aria2.saveSession", vec![]).await
    }

    pub async fn shutdown(&self) -> Result<Value, RpcError> {
        self.call("aria2.shutdown", vec![]).await
    }

    pub async fn force_shutdown(&self) -> Result<Value, RpcError> {
        self.call("aria2.forceShutdown", vec![]).await
    }

    pub async fn purge_download_result(&self) -> Result<Value, RpcError> {
        self.call("aria2.purgeDownloadResult", vec![]).await
    }

    pub async fn remove_download_result(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("aria2.removeDownloadResult", vec![json!(gid)])
            .await
    }

    // system.* never carries the secret.

    pub async fn list_methods(&self) -> Result<Vec<String>, RpcError> {
        let value = self
            .send_request(
                CallOptions::default().secret(false),
                "system.listMethods",
                vec![],
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn list_notifications(&self) -> Result<Vec<String>, RpcError> {
        let value = self
            .send_request(
                CallOptions::default().secret(false),
                "system.listNotifications",
                vec![],
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    // Notification shorthands.

    pub fn on_download_start<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on_notification("aria2.onDownloadStart", listener)
    }

    pub fn on_download_pause<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on_notification("aria2.onDownloadPause", listener)
    }

    pub fn on_download_stop<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on_notification("aria2.onDownloadStop", listener)
    }

    pub fn on_download_complete<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on_notification("aria2.onDownloadComplete", listener)
    }

    pub fn on_download_error<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on_notification("aria2.onDownloadError", listener)
    }

    pub fn on_bt_download_complete<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on_notification("aria2.onBtDownloadComplete", listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_info_deserializes_from_aria2_shape() {
        let info: VersionInfo = serde_json::from_value(json!({
            "version": "1.36.0",
            "enabledFeatures": ["BitTorrent", "Metalink"],
        }))
        .unwrap();
        assert_eq!(info.version, "1.36.0");
        assert_eq!(info.enabled_features.len(), 2);
    }

    #[test]
    fn global_stat_deserializes_from_aria2_shape() {
        let stat: GlobalStat = serde_json::from_value(json!({
            "downloadSpeed": "0",
            "uploadSpeed": "0",
            "numActive": "1",
            "numWaiting": "0",
            "numStopped": "2",
            "numStoppedTotal": "2",
        }))
        .unwrap();
        assert_eq!(stat.num_active, "1");
        assert_eq!(stat.num_stopped_total, "2");
    }
}
