use tracing::info;

use super::traits::DataVolumeClient;
use crate::errors::StoreResult;

/// Hard-delete the named volumes in order.
///
/// A volume that is already gone counts as deleted and iteration continues;
/// any other failure aborts immediately, leaving later volumes untouched.
/// The sequential fail-fast ordering is part of the observable contract.
pub async fn delete_data_volumes(
    client: &dyn DataVolumeClient,
    namespace: &str,
    names: &[String],
) -> StoreResult<()> {
    for name in names {
        match client.delete(namespace, name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!(namespace, volume = %name, "data volume already deleted");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
