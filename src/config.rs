use std::convert::TryInto;
use std::ffi::OsStr;
use std::fs::File;

use justconfig::item::ValueExtractor;
use justconfig::processors::Trim;
use justconfig::sources::env::Env;
use justconfig::sources::text::ConfigText;
use justconfig::ConfPath;
use justconfig::Config;

// Set some default values
const DEFAULT_MIN_ITEM_RATINGS: usize = 4;
const DEFAULT_MIN_USER_RATINGS: usize = 3;
const DEFAULT_SIMILARITY_MODE: &str = "adjusted-cosine";
const DEFAULT_MIN_COMPARISONS: usize = 4;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;
const DEFAULT_NUM_ITEMS_TO_RECOMMEND: usize = 50;
const DEFAULT_TEST_FRACTION: f64 = 0.2;
const DEFAULT_SEED: u64 = 5;
const DEFAULT_NUM_FOLDS: usize = 10;
const DEFAULT_ITEMS_TO_OMIT: usize = 2;

pub struct AppConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub eval: EvalConfig,
    pub runtime: RuntimeConfig,
}

pub struct DataConfig {
    pub ratings_data_path: String,
    /// optional item metadata file for presentation, empty disables titles
    pub item_titles_path: String,
    pub min_item_ratings: usize,
    pub min_user_ratings: usize,
}

pub struct ModelConfig {
    pub similarity: String,
    pub min_comparisons: usize,
    pub similarity_threshold: f64,
    pub num_items_to_recommend: usize,
    /// optional path for the exported similar-items graph, empty disables
    /// the cache
    pub graph_cache_path: String,
}

pub struct EvalConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub num_folds: usize,
    pub items_to_omit: usize,
}

pub struct RuntimeConfig {
    pub num_workers: usize,
}

impl AppConfig {
    pub fn new(config_path: String) -> AppConfig {
        // Initialize config object
        let mut conf = Config::default();

        // Check if there is a config file
        if let Ok(config_file) = File::open(&config_path) {
            let config_text = ConfigText::new(config_file, &config_path)
                .expect("Loading configuration file failed.");
            conf.add_source(config_text);
        }

        // Define config params from environment variables
        let config_env = Env::new(&[
            (
                ConfPath::from(&["data", "ratings_data_path"]),
                OsStr::new("RATINGS_DATA"),
            ),
            (
                ConfPath::from(&["runtime", "num_workers"]),
                OsStr::new("NUM_WORKERS"),
            ),
        ]);
        conf.add_source(config_env);

        // Parse into custom config struct
        AppConfig::parse(conf)
    }

    fn parse(conf: justconfig::Config) -> AppConfig {
        AppConfig {
            data: DataConfig::parse(&conf, ConfPath::from(&["data"])),
            model: ModelConfig::parse(&conf, ConfPath::from(&["model"])),
            eval: EvalConfig::parse(&conf, ConfPath::from(&["eval"])),
            runtime: RuntimeConfig::parse(&conf, ConfPath::from(&["runtime"])),
        }
    }
}

impl DataConfig {
    fn parse(conf: &Config, path: ConfPath) -> DataConfig {
        DataConfig {
            ratings_data_path: conf
                .get(path.push("ratings_data_path"))
                .trim()
                .value()
                .unwrap(),
            item_titles_path: conf
                .get(path.push("item_titles_path"))
                .trim()
                .value()
                .unwrap_or_default(),
            min_item_ratings: conf
                .get(path.push("min_item_ratings"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_MIN_ITEM_RATINGS),
            min_user_ratings: conf
                .get(path.push("min_user_ratings"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_MIN_USER_RATINGS),
        }
    }
}

impl ModelConfig {
    fn parse(conf: &Config, path: ConfPath) -> ModelConfig {
        ModelConfig {
            similarity: conf
                .get(path.push("similarity"))
                .trim()
                .value()
                .unwrap_or_else(|_| String::from(DEFAULT_SIMILARITY_MODE)),
            min_comparisons: conf
                .get(path.push("min_comparisons"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_MIN_COMPARISONS),
            similarity_threshold: conf
                .get(path.push("similarity_threshold"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            num_items_to_recommend: conf
                .get(path.push("num_items_to_recommend"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_NUM_ITEMS_TO_RECOMMEND),
            graph_cache_path: conf
                .get(path.push("graph_cache_path"))
                .trim()
                .value()
                .unwrap_or_default(),
        }
    }
}

impl EvalConfig {
    fn parse(conf: &Config, path: ConfPath) -> EvalConfig {
        EvalConfig {
            test_fraction: conf
                .get(path.push("test_fraction"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_TEST_FRACTION),
            seed: conf
                .get(path.push("seed"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_SEED),
            num_folds: conf
                .get(path.push("num_folds"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_NUM_FOLDS),
            items_to_omit: conf
                .get(path.push("items_to_omit"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_ITEMS_TO_OMIT),
        }
    }
}

impl RuntimeConfig {
    fn parse(conf: &Config, path: ConfPath) -> RuntimeConfig {
        RuntimeConfig {
            num_workers: conf
                .get(path.push("num_workers"))
                .trim()
                .value()
                // Detect number of CPUs
                .unwrap_or_else(|_| sys_info::cpu_num().unwrap_or_default().try_into().unwrap()),
        }
    }
}
