use pulse_core::PulseApp;

use super::print_json;

pub fn run(yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !yes {
        return Err("refusing to delete all data without --yes".into());
    }
    let app = PulseApp::open()?;
    print_json(&app.reset_all_data()?)
}
