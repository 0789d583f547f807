#![no_main]

use bagit_core::Profile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(profile) = Profile::from_json(data, "fuzz") {
        for (field, _) in &profile.metadata_requirements {
            assert!(profile.requirement(field).is_some());
        }
    }
});
