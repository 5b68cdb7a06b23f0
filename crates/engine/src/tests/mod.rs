mod helpers;
mod read_tests;
mod scan_tests;
mod scenario_tests;
