//! CLI flag fragments (spec.md §6), in the teacher's `clap::Parser`
//! flatten-per-concern style (see `common/src/args.rs`'s `PostgresArgs`,
//! `RedisArgs`, etc. in the pack).

use clap::Parser;

/// mTLS listener configuration. The three certificate flags are deliberately
/// NOT marked `required` on the `clap::Parser` derive: `clap` would reject a
/// missing flag by printing usage and exiting with status 2 before `main`'s
/// body ever runs, which violates the original's exit-code contract (spec.md
/// §6: "Exit code is 0 on both clean shutdown and startup error."). Instead
/// they default to empty, and `main` reproduces the original's manual
/// `if tlsCertFile == "" || ...` check itself, on the path that exits 0.
#[derive(Parser, Debug, Clone)]
pub struct TlsArgs {
    #[arg(long = "tls_cert_file", default_value = "")]
    pub tls_cert_file: String,

    #[arg(long = "tls_private_key_file", default_value = "")]
    pub tls_private_key_file: String,

    #[arg(long = "ca_cert_file", default_value = "")]
    pub ca_cert_file: String,

    #[arg(long = "listen_address", default_value = ":8443")]
    pub listen_address: String,

    #[arg(long = "health_address", default_value = ":8080")]
    pub health_address: String,
}

/// Cluster client configuration, mirroring `client-go`'s
/// `clientcmd.BuildConfigFromFlags(master, kubeconfig)`.
#[derive(Parser, Debug, Clone, Default)]
pub struct ClusterArgs {
    #[arg(long = "kubeconfig")]
    pub kubeconfig: Option<String>,

    #[arg(long = "master")]
    pub master: Option<String>,
}
