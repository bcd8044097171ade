//! Canonical column names used when reading and writing parcel collections.

pub const OBJECT_ID: &str = "object_id";
pub const STATE: &str = "state";
pub const MANAGING_AGENCY: &str = "managing_agency";
pub const STATE_ENABLING_ACT: &str = "state_enabling_act";
pub const TRUST_NAME: &str = "trust_name";
pub const RESERVATION_NAME: &str = "reservation_name";
pub const RIGHTS_TYPE: &str = "rights_type";
pub const RIGHTS_TYPE_INFO: &str = "rights_type_info";
pub const ACRES: &str = "acres";
pub const GIS_ACRES: &str = "gis_acres";
pub const NET_ACRES: &str = "net_acres";
pub const CLIPPED_ACRES: &str = "clipped_acres";
pub const ACTIVITY: &str = "activity";
pub const ACTIVITY_INFO: &str = "activity_info";
pub const COUNTY: &str = "county";
pub const MERIDIAN: &str = "meridian";
pub const TOWNSHIP: &str = "township";
pub const RANGE: &str = "range";
pub const SECTION: &str = "section";
pub const ALIQUOT: &str = "aliquot";

/// Canonical output name of a lessee column in rename rules.
pub const LESSEE: &str = "lessee";
/// Canonical output name of a lease status column in rename rules.
pub const LEASE_STATUS: &str = "lease_status";

/// Columns of the final parcel dataset, in output order.
pub const FINAL_DATASET_COLUMNS: &[&str] = &[
    OBJECT_ID,
    STATE,
    MANAGING_AGENCY,
    STATE_ENABLING_ACT,
    TRUST_NAME,
    RESERVATION_NAME,
    RIGHTS_TYPE,
    RIGHTS_TYPE_INFO,
    ACRES,
    GIS_ACRES,
    NET_ACRES,
    CLIPPED_ACRES,
    ACTIVITY,
    ACTIVITY_INFO,
    COUNTY,
    MERIDIAN,
    TOWNSHIP,
    RANGE,
    SECTION,
    ALIQUOT,
];
