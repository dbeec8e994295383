// JNI bridge for the Android activity
//
// Native methods declared by com.example.wavemaker.MainActivity:
//   private native void startEngine();
//   private native void stopEngine();
//   private native void touchEvent(int action);

use jni::objects::{GlobalRef, JObject};
use jni::sys::jint;
use jni::JNIEnv;
use log::info;
use once_cell::sync::OnceCell;

use crate::api;
use crate::error::{log_audio_error, AudioError};

/// Activity reference kept alive for ndk-context
static ANDROID_CONTEXT: OnceCell<GlobalRef> = OnceCell::new();

/// JNI_OnLoad is called when the native library is loaded by Android
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    _vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    crate::init_logging(tracing::Level::INFO);
    info!("JNI_OnLoad called");
    jni::sys::JNI_VERSION_1_6
}

/// Initialize ndk-context from the activity so oboe-rs can reach the
/// Android audio subsystem. Runs once per process.
fn init_android_context(env: &mut JNIEnv, activity: &JObject) -> Result<(), AudioError> {
    ANDROID_CONTEXT
        .get_or_try_init(|| {
            let vm = env.get_java_vm().map_err(|e| AudioError::JniInitFailed {
                reason: format!("get_java_vm: {}", e),
            })?;
            let context = env
                .new_global_ref(activity)
                .map_err(|e| AudioError::JniInitFailed {
                    reason: format!("new_global_ref: {}", e),
                })?;

            // SAFETY: the VM pointer is valid for the life of the process and
            // the activity is pinned by the global reference stored below.
            unsafe {
                ndk_context::initialize_android_context(
                    vm.get_java_vm_pointer().cast(),
                    context.as_obj().as_raw().cast(),
                );
            }
            info!("Android context initialized successfully");
            Ok(context)
        })
        .map(|_| ())
}

#[no_mangle]
pub extern "system" fn Java_com_example_wavemaker_MainActivity_startEngine(
    mut env: JNIEnv,
    this: JObject,
) {
    if let Err(err) = init_android_context(&mut env, &this) {
        log_audio_error(&err, "startEngine");
        return;
    }
    if let Err(err) = api::start_engine() {
        log_audio_error(&err, "startEngine");
    }
}

#[no_mangle]
pub extern "system" fn Java_com_example_wavemaker_MainActivity_stopEngine(
    _env: JNIEnv,
    _this: JObject,
) {
    if let Err(err) = api::stop_engine() {
        log_audio_error(&err, "stopEngine");
    }
}

#[no_mangle]
pub extern "system" fn Java_com_example_wavemaker_MainActivity_touchEvent(
    _env: JNIEnv,
    _this: JObject,
    action: jint,
) {
    if let Err(err) = api::touch_event(action) {
        log_audio_error(&err, "touchEvent");
    }
}
