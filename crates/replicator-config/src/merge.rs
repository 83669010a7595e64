//! Field-wise layering of configurations.

use crate::model::{ClusterScaling, Config, JobScaling, Notification, Telemetry};

/// Overlays one value onto another, field by field.
///
/// For every field the overlay's value wins when it differs from the type's
/// default value; otherwise the base value is kept. Sections are merged
/// recursively rather than replaced. As a consequence a boolean overlay can
/// switch a setting on but never off.
pub trait Merge {
    /// Returns a new value with `overlay` layered on top of `self`.
    #[must_use]
    fn merge(&self, overlay: &Self) -> Self;
}

fn pick<T>(base: &T, overlay: &T) -> T
where
    T: Clone + Default + PartialEq,
{
    if *overlay == T::default() {
        base.clone()
    } else {
        overlay.clone()
    }
}

impl Merge for Config {
    fn merge(&self, overlay: &Self) -> Self {
        Self {
            consul: pick(&self.consul, &overlay.consul),
            nomad: pick(&self.nomad, &overlay.nomad),
            log_level: pick(&self.log_level, &overlay.log_level),
            scaling_interval: pick(&self.scaling_interval, &overlay.scaling_interval),
            region: pick(&self.region, &overlay.region),
            cluster_scaling: self.cluster_scaling.merge(&overlay.cluster_scaling),
            job_scaling: self.job_scaling.merge(&overlay.job_scaling),
            telemetry: self.telemetry.merge(&overlay.telemetry),
            notification: self.notification.merge(&overlay.notification),
        }
    }
}

impl Merge for ClusterScaling {
    fn merge(&self, overlay: &Self) -> Self {
        Self {
            enabled: pick(&self.enabled, &overlay.enabled),
            max_size: pick(&self.max_size, &overlay.max_size),
            min_size: pick(&self.min_size, &overlay.min_size),
            cool_down: pick(&self.cool_down, &overlay.cool_down),
            node_fault_tolerance: pick(&self.node_fault_tolerance, &overlay.node_fault_tolerance),
            autoscaling_group: pick(&self.autoscaling_group, &overlay.autoscaling_group),
        }
    }
}

impl Merge for JobScaling {
    fn merge(&self, overlay: &Self) -> Self {
        Self {
            enabled: pick(&self.enabled, &overlay.enabled),
            consul_token: pick(&self.consul_token, &overlay.consul_token),
            consul_key_location: pick(&self.consul_key_location, &overlay.consul_key_location),
        }
    }
}

impl Merge for Telemetry {
    fn merge(&self, overlay: &Self) -> Self {
        Self {
            statsd_address: pick(&self.statsd_address, &overlay.statsd_address),
        }
    }
}

impl Merge for Notification {
    fn merge(&self, overlay: &Self) -> Self {
        Self {
            cluster_scaling_uid: pick(&self.cluster_scaling_uid, &overlay.cluster_scaling_uid),
            cluster_identifier: pick(&self.cluster_identifier, &overlay.cluster_identifier),
            pager_duty_service_key: pick(
                &self.pager_duty_service_key,
                &overlay.pager_duty_service_key,
            ),
        }
    }
}
