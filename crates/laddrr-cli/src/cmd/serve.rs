use std::path::Path;

use laddrr_core::config::WarnLevel;

pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => tracing::error!("{}", w.message),
        }
    }
    let port = port.unwrap_or(config.server.port);
    let root_buf = root.to_path_buf();

    super::runtime()?.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        println!("laddrr → http://localhost:{}", listener.local_addr()?.port());

        tokio::select! {
            res = laddrr_server::serve_on(root_buf, &config, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
