use hashvgg::config::NetConfig;
use hashvgg::model::{HashVgg, ModelOptions};
use hashvgg::modelio::{load_checkpoint, save_checkpoint};
use hashvgg::tensor;
use hashvgg::tensors::Tensor;
use std::env;

fn tiny_config() -> NetConfig {
    NetConfig {
        input: (4, 4, 1),
        conv_layers: vec![1],
        conv_channels: vec![2],
        dense_units: vec![3],
        hash_codes: 2,
        lambda_l1: 0.0,
        lambda_l2: 5e-4,
    }
}

fn tiny_options(tag: &str) -> ModelOptions {
    ModelOptions {
        save_path: format!(
            "{}/hashvgg_{}_{}",
            env::temp_dir().display(),
            tag,
            std::process::id()
        ),
        ..ModelOptions::default()
    }
}

fn tiny_batch(n: usize) -> (Tensor<f64>, Tensor<f64>) {
    let input = Tensor::new(
        vec![n, 4, 4, 1],
        (0..n * 16).map(|i| (i % 7) as f64 / 7.0).collect(),
    );
    let labels = Tensor::new(vec![n, 1], (0..n).map(|i| (i % 2) as f64).collect());
    (input, labels)
}

#[test]
fn test_tensor_macro_infers_shape() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_tensor_shape_mismatch_panics() {
    let result = std::panic::catch_unwind(|| Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]));
    assert!(result.is_err());
}

#[test]
fn test_config_flat_dim_halves_per_stage() {
    assert_eq!(tiny_config().flat_dim(), 8);

    let deep = NetConfig {
        input: (5, 5, 1),
        conv_layers: vec![1, 1],
        conv_channels: vec![2, 3],
        dense_units: vec![4],
        hash_codes: 2,
        lambda_l1: 0.0,
        lambda_l2: 0.0,
    };
    // 5 -> 3 -> 2 under ceil halving, times 3 channels
    assert_eq!(deep.flat_dim(), 12);
}

#[test]
fn test_predict_shape_and_probability_range() {
    let model = HashVgg::build(tiny_config(), tiny_options("predict")).unwrap();
    let (input, _) = tiny_batch(3);

    let probs = model.predict(&input);
    assert_eq!(probs.shape, vec![3, 1]);
    assert!(probs.data.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_hidden_activations_layout() {
    let model = HashVgg::build(tiny_config(), tiny_options("hidden")).unwrap();
    let (input, labels) = tiny_batch(3);

    let (metrics, hidden) = model.eval_batch_with_hidden(&input, &labels);
    assert!(metrics.loss.is_finite());
    assert_eq!(hidden.len(), 2);
    assert_eq!(hidden[0].shape, vec![3, 3]);
    assert_eq!(hidden[1].shape, vec![3, 2]);
    // the hash code is a sigmoid output
    assert!(hidden[1].data.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_hash_layer_is_optional() {
    let mut options = tiny_options("nohash");
    options.use_hash = false;
    let model = HashVgg::build(tiny_config(), options).unwrap();
    let (input, labels) = tiny_batch(2);

    let (_, hidden) = model.eval_batch_with_hidden(&input, &labels);
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].shape, vec![2, 3]);
}

#[test]
fn test_unknown_optimizer_is_rejected() {
    let mut options = tiny_options("badopt");
    options.optimizer = "adagrad".to_string();
    assert!(HashVgg::build(tiny_config(), options).is_err());
}

#[test]
fn test_mismatched_conv_widths_panic() {
    let result = std::panic::catch_unwind(|| {
        let mut config = tiny_config();
        config.conv_channels = vec![2, 4];
        HashVgg::build(config, ModelOptions::default())
    });
    assert!(result.is_err());
}

#[test]
fn test_train_step_advances_state() {
    let mut model = HashVgg::build(tiny_config(), tiny_options("step")).unwrap();
    let (input, labels) = tiny_batch(4);

    let before = model.params().get(0).value.data.clone();
    let metrics = model.train_step(&input, &labels);

    assert!(metrics.loss.is_finite());
    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert_eq!(model.global_step(), 1);
    // weight decay moves every nonzero parameter even if the data
    // gradient dies at a ReLU
    assert_ne!(model.params().get(0).value.data, before);
    assert!(model.params().get(0).grad.data.iter().all(|&g| g == 0.0));
}

#[test]
fn test_lr_decay_follows_power_law() {
    let mut options = tiny_options("decay");
    options.start_lr = 0.5;
    options.decay = 0.1;
    let mut model = HashVgg::build(tiny_config(), options).unwrap();
    let (input, labels) = tiny_batch(2);

    for _ in 0..3 {
        model.train_step(&input, &labels);
        // evaluation between steps must not touch the rate
        model.eval_batch(&input, &labels);
    }
    assert!((model.l_rate() - 0.5 * 0.9_f64.powi(3)).abs() < 1e-12);
    assert_eq!(model.global_step(), 3);

    model.reset_lr();
    assert_eq!(model.l_rate(), 0.5);
}

#[test]
fn test_adam_optimizer_steps() {
    let mut options = tiny_options("adam");
    options.optimizer = "adam".to_string();
    let mut model = HashVgg::build(tiny_config(), options).unwrap();
    let (input, labels) = tiny_batch(2);

    let metrics = model.train_step(&input, &labels);
    assert!(metrics.loss.is_finite());
    assert_eq!(model.global_step(), 1);
}

#[test]
fn test_evaluation_ignores_dropout() {
    let mut options = tiny_options("dropeval");
    options.dropout = 0.5;
    let model = HashVgg::build(tiny_config(), options).unwrap();
    let (input, labels) = tiny_batch(3);

    let a = model.eval_batch(&input, &labels);
    let b = model.eval_batch(&input, &labels);
    assert_eq!(a.loss, b.loss);
    assert_eq!(a.accuracy, b.accuracy);

    let p1 = model.predict(&input);
    let p2 = model.predict(&input);
    assert_eq!(p1.data, p2.data);
}

#[test]
fn test_checkpoint_roundtrip_restores_params_and_step() {
    let options = tiny_options("roundtrip");
    let mut model = HashVgg::build(tiny_config(), options.clone()).unwrap();
    let (input, labels) = tiny_batch(4);
    model.train_step(&input, &labels);
    model.train_step(&input, &labels);

    let path = model.save().unwrap();
    assert!(path.ends_with("hashVGG16-2.bpat"));

    let ckpt = load_checkpoint(&path).unwrap();
    assert_eq!(ckpt.global_step, 2);
    assert_eq!(ckpt.tensors.len(), model.params().len());

    let mut fresh = HashVgg::build(tiny_config(), options).unwrap();
    fresh.restore(&path).unwrap();
    assert_eq!(fresh.global_step(), 2);
    for (idx, (name, slot)) in model.params().iter().enumerate() {
        let restored = fresh.params().get(idx);
        assert_eq!(fresh.params().name(idx), name);
        assert_eq!(restored.value.shape, slot.value.shape);
        assert_eq!(restored.value.data, slot.value.data);
    }
}

#[test]
fn test_low_level_checkpoint_roundtrip() {
    let path = format!(
        "{}/hashvgg_lowlevel_{}.bpat",
        env::temp_dir().display(),
        std::process::id()
    );
    let w = Tensor::new(vec![2, 2], vec![1.0, -2.0, 3.5, 0.0]);
    let b = Tensor::new(vec![2], vec![0.25, -0.75]);
    save_checkpoint(&path, 7, &[("w", &w), ("b", &b)]).unwrap();

    let ckpt = load_checkpoint(&path).unwrap();
    assert_eq!(ckpt.global_step, 7);
    assert_eq!(ckpt.tensors.len(), 2);
    assert_eq!(ckpt.tensors[0].0, "w");
    assert_eq!(ckpt.tensors[0].1.shape, vec![2, 2]);
    assert_eq!(ckpt.tensors[0].1.data, vec![1.0, -2.0, 3.5, 0.0]);
    assert_eq!(ckpt.tensors[1].0, "b");
    assert_eq!(ckpt.tensors[1].1.data, vec![0.25, -0.75]);
}

#[test]
fn test_checkpoint_rejects_bad_magic() {
    let path = format!(
        "{}/hashvgg_badmagic_{}.bpat",
        env::temp_dir().display(),
        std::process::id()
    );
    std::fs::write(&path, b"not a checkpoint at all").unwrap();
    assert!(load_checkpoint(&path).is_err());
}

#[test]
fn test_restore_rejects_mismatched_model() {
    let options = tiny_options("mismatch");
    let model = HashVgg::build(tiny_config(), options.clone()).unwrap();
    let path = model.save().unwrap();

    let mut config = tiny_config();
    config.hash_codes = 3;
    let mut other = HashVgg::build(config, options).unwrap();
    assert!(other.restore(&path).is_err());
}
