mod hold_scenarios;
mod support;
