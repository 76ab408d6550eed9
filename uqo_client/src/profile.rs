use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "uqo";
const CONFIG_FILE: &str = "uqo.conf";

fn expand(path: &str) -> PathBuf {
	PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn config_file_in(dir: PathBuf) -> PathBuf {
	dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Candidate config files, lowest priority first.
#[cfg(windows)]
pub fn get_config_paths() -> Vec<PathBuf> {
	let mut v = Vec::new();
	if let Ok(program_data) = std::env::var("PROGRAMDATA") {
		v.push(config_file_in(PathBuf::from(program_data)));
	}
	match std::env::var("LOCALAPPDATA") {
		Ok(local) => v.push(config_file_in(PathBuf::from(local))),
		Err(_) => v.push(config_file_in(expand("~/AppData/Local"))),
	}
	v.push(Path::new(".").join(CONFIG_FILE));
	v
}

/// Candidate config files, lowest priority first.
#[cfg(target_os = "macos")]
pub fn get_config_paths() -> Vec<PathBuf> {
	vec![
		config_file_in(PathBuf::from("/Library/Application Support")),
		config_file_in(expand("~/Library/Application Support")),
		Path::new(".").join(CONFIG_FILE),
	]
}

/// Candidate config files, lowest priority first.
#[cfg(all(unix, not(target_os = "macos")))]
pub fn get_config_paths() -> Vec<PathBuf> {
	let dirs = std::env::var("XDG_CONFIG_DIRS").unwrap_or_else(|_| "/etc/xdg".to_owned());
	// XDG_CONFIG_DIRS lists the most important directory first
	let mut v = std::env::split_paths(&dirs)
		.map(|dir| config_file_in(expand(&dir.to_string_lossy())))
		.collect::<Vec<_>>();
	v.reverse();
	let home = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| "~/.config".to_owned());
	v.push(config_file_in(expand(&home)));
	v.push(Path::new(".").join(CONFIG_FILE));
	v
}

#[test]
fn working_directory_has_highest_priority() {
	let paths = get_config_paths();
	assert_eq!(paths.last(), Some(&Path::new(".").join(CONFIG_FILE)));
	assert!(paths[..paths.len() - 1]
		.iter()
		.all(|p| p.ends_with(Path::new(CONFIG_DIR).join(CONFIG_FILE))));
}
