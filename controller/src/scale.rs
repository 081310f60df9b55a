//! Scale Executor (§4.B): the one place that writes `spec.replicas` on a
//! live deployment. Grounded on the original's `server/scale.go` `Scale`
//! function.

use replicon_types::LiveDeployment;

use crate::client::KubeClient;
use crate::util::Error;

pub async fn scale(
    client: &KubeClient,
    namespace: &str,
    name: &str,
    replicas: i32,
) -> Result<LiveDeployment, Error> {
    let deployment = client.scale_deployment(namespace, name, replicas).await?;
    Ok(LiveDeployment::from_deployment(&deployment))
}
