pub mod v1beta1;

/// API group served by the OME operator
pub const OME_GROUP: &str = "ome.io";

/// Current API version of the OME custom resources
pub const OME_V1BETA1_VERSION: &str = "v1beta1";
