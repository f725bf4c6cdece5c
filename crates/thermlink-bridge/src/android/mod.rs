// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android Bluetooth bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Each trait method invokes the corresponding
// `android.bluetooth` API through JNI calls into the ART runtime.
//
// ## Architecture notes
//
// Java objects that outlive a single call (devices, sockets, output streams)
// are held as `GlobalRef`s so they can be used from whichever tokio blocking
// thread picks up the next call. Threads are attached permanently because the
// blocking pool reuses them, so a native thread never returns to Java and
// never drops its local references on its own. Every call therefore runs in
// its own local frame (`in_local_frame`); per-call objects such as payload
// byte arrays are released when the call returns.
//
// The host app must hold BLUETOOTH_CONNECT (API 31+) or BLUETOOTH/ADMIN
// (older releases). Missing permissions surface as `SecurityException`
// messages inside `ThermlinkError::Bridge`.

#![cfg(target_os = "android")]

use std::sync::{Arc, Mutex, OnceLock};

use jni::objects::{GlobalRef, JObject, JObjectArray, JString, JValue};
use jni::{JNIEnv, JavaVM};
use uuid::Uuid;

use thermlink_core::error::{Result, ThermlinkError};
use thermlink_core::types::{DeviceClass, DeviceDescriptor};

use crate::traits::*;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

const SOCKET_SIG: &str = "Landroid/bluetooth/BluetoothSocket;";

static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

/// The process-wide `JavaVM`, read once from the NDK context.
fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = JAVA_VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| ThermlinkError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    Ok(JAVA_VM.get_or_init(|| vm))
}

/// Obtain a [`JNIEnv`] for the current thread, attaching it if needed.
fn jni_env() -> Result<JNIEnv<'static>> {
    java_vm()?
        .attach_current_thread_permanently()
        .map_err(|e| ThermlinkError::Bridge(format!("failed to attach JNI thread: {e}")))
}

/// Run `f` inside a fresh JNI local frame on the current thread. Local
/// references created by `f` are freed when it returns; the result must not
/// carry any.
fn in_local_frame<T>(capacity: i32, f: impl FnOnce(&mut JNIEnv<'_>) -> Result<T>) -> Result<T> {
    local_frame(&mut jni_env()?, capacity, f)
}

/// Nested local frame on an env that is already in use.
fn local_frame<T>(
    env: &mut JNIEnv<'_>,
    capacity: i32,
    f: impl FnOnce(&mut JNIEnv<'_>) -> Result<T>,
) -> Result<T> {
    env.with_local_frame(capacity, |env| Ok::<_, jni::errors::Error>(f(env)))
        .map_err(|e| ThermlinkError::Bridge(format!("failed to push JNI local frame: {e}")))?
}

/// Convert a failed JNI call into an error, consuming any pending Java
/// exception so the thread stays usable.
///
/// The exception's `getMessage()` is preferred over the jni-rs error text
/// because it carries the radio's reason ("read failed, socket might closed").
fn java_failure(env: &mut JNIEnv<'_>, context: &str, e: jni::errors::Error) -> String {
    if !env.exception_check().unwrap_or(false) {
        return format!("{context}: {e}");
    }
    let throwable = env.exception_occurred();
    let _ = env.exception_clear();
    let message = throwable.ok().and_then(|t| {
        let msg = env
            .call_method(&t, "toString", "()Ljava/lang/String;", &[])
            .ok()?
            .l()
            .ok()?;
        java_string(env, msg).ok().flatten()
    });
    match message {
        Some(m) => format!("{context}: {m}"),
        None => format!("{context}: {e}"),
    }
}

fn bridge_err(env: &mut JNIEnv<'_>, context: &str, e: jni::errors::Error) -> ThermlinkError {
    ThermlinkError::Bridge(java_failure(env, context, e))
}

/// Read a nullable `java.lang.String`.
fn java_string(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> jni::errors::Result<Option<String>> {
    if obj.is_null() {
        return Ok(None);
    }
    let s: String = env.get_string(&JString::from(obj))?.into();
    Ok(Some(s))
}

/// `BluetoothAdapter.getDefaultAdapter()`; `PlatformUnavailable` if the
/// device has no Bluetooth hardware.
fn default_adapter<'a>(env: &mut JNIEnv<'a>) -> Result<JObject<'a>> {
    let adapter = env
        .call_static_method(
            "android/bluetooth/BluetoothAdapter",
            "getDefaultAdapter",
            "()Landroid/bluetooth/BluetoothAdapter;",
            &[],
        )
        .and_then(|v| v.l())
        .map_err(|e| bridge_err(env, "BluetoothAdapter.getDefaultAdapter", e))?;
    if adapter.is_null() {
        return Err(ThermlinkError::PlatformUnavailable);
    }
    Ok(adapter)
}

// ---------------------------------------------------------------------------
// Radio
// ---------------------------------------------------------------------------

/// Android implementation of the Thermlink radio.
///
/// The struct is zero-sized; the adapter is looked up on every call because
/// it can be replaced when the user toggles Bluetooth.
pub struct AndroidBridge;

impl AndroidBridge {
    /// Create a new Android bridge.
    ///
    /// This does **not** touch JNI; the first JNI call happens lazily when
    /// a trait method is invoked.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl BluetoothRadio for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn cancel_discovery(&self) -> Result<()> {
        in_local_frame(8, |env| {
            let adapter = default_adapter(env)?;
            env.call_method(&adapter, "cancelDiscovery", "()Z", &[])
                .and_then(|v| v.z())
                .map_err(|e| bridge_err(env, "BluetoothAdapter.cancelDiscovery", e))?;
            Ok(())
        })
    }

    /// `adapter.getBondedDevices().toArray()`, each wrapped in a global ref.
    fn bonded_devices(&self) -> Result<Vec<Arc<dyn RemoteDevice>>> {
        in_local_frame(16, |env| {
            let adapter = default_adapter(env)?;

            let set = env
                .call_method(&adapter, "getBondedDevices", "()Ljava/util/Set;", &[])
                .and_then(|v| v.l())
                .map_err(|e| bridge_err(env, "BluetoothAdapter.getBondedDevices", e))?;
            if set.is_null() {
                return Ok(Vec::new());
            }

            let array: JObjectArray = env
                .call_method(&set, "toArray", "()[Ljava/lang/Object;", &[])
                .and_then(|v| v.l())
                .map_err(|e| bridge_err(env, "Set.toArray", e))?
                .into();
            let len = env
                .get_array_length(&array)
                .map_err(|e| bridge_err(env, "get_array_length", e))?;

            let mut devices: Vec<Arc<dyn RemoteDevice>> = Vec::with_capacity(len as usize);
            for i in 0..len {
                // Each element gets its own frame so large bonded lists stay
                // within the local-reference capacity.
                devices.push(local_frame(env, 8, |env| bonded_device(env, &array, i))?);
            }

            tracing::debug!(count = devices.len(), "Android: bonded devices enumerated");
            Ok(devices)
        })
    }
}

/// Wrap element `i` of the bonded-device array in a global ref.
fn bonded_device(env: &mut JNIEnv<'_>, array: &JObjectArray<'_>, i: i32) -> Result<Arc<dyn RemoteDevice>> {
    let device = env
        .get_object_array_element(array, i)
        .map_err(|e| bridge_err(env, "get_object_array_element", e))?;
    let address = env
        .call_method(&device, "getAddress", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .map_err(|e| bridge_err(env, "BluetoothDevice.getAddress", e))?;
    let address = java_string(env, address)
        .map_err(|e| bridge_err(env, "get_string(address)", e))?
        .unwrap_or_default();
    let device = env
        .new_global_ref(device)
        .map_err(|e| bridge_err(env, "new_global_ref(device)", e))?;
    Ok(Arc::new(AndroidDevice { device, address }))
}

// ---------------------------------------------------------------------------
// Remote device
// ---------------------------------------------------------------------------

/// A `BluetoothDevice` held across calls.
pub struct AndroidDevice {
    device: GlobalRef,
    address: String,
}

impl AndroidDevice {
    fn wrap_socket(&self, env: &mut JNIEnv<'_>, socket: JObject<'_>) -> Result<Arc<dyn RfcommChannel>> {
        if socket.is_null() {
            return Err(ThermlinkError::Connection(format!(
                "{}: socket factory returned null",
                self.address
            )));
        }
        let socket = env
            .new_global_ref(socket)
            .map_err(|e| bridge_err(env, "new_global_ref(socket)", e))?;
        Ok(Arc::new(AndroidChannel {
            socket,
            output: Mutex::new(None),
        }))
    }

    /// Call `create*RfcommSocket(int)` by name. JNI resolves hidden methods
    /// without the reflection restrictions Java code runs into.
    fn raw_socket<'local>(
        &self,
        env: &mut JNIEnv<'local>,
        method: &str,
        channel: u8,
    ) -> std::result::Result<JObject<'local>, String> {
        env.call_method(
            self.device.as_obj(),
            method,
            format!("(I){SOCKET_SIG}"),
            &[JValue::Int(i32::from(channel))],
        )
        .and_then(|v| v.l())
        .map_err(|e| java_failure(env, method, e))
    }
}

impl RemoteDevice for AndroidDevice {
    fn address(&self) -> &str {
        &self.address
    }

    fn describe(&self) -> Result<DeviceDescriptor> {
        in_local_frame(16, |env| {
            let device = self.device.as_obj();

            let name = env
                .call_method(device, "getName", "()Ljava/lang/String;", &[])
                .and_then(|v| v.l())
                .map_err(|e| bridge_err(env, "BluetoothDevice.getName", e))?;
            let name = java_string(env, name).map_err(|e| bridge_err(env, "get_string(name)", e))?;

            let class_obj = env
                .call_method(
                    device,
                    "getBluetoothClass",
                    "()Landroid/bluetooth/BluetoothClass;",
                    &[],
                )
                .and_then(|v| v.l())
                .map_err(|e| bridge_err(env, "BluetoothDevice.getBluetoothClass", e))?;
            if class_obj.is_null() {
                return Err(ThermlinkError::Bridge(format!(
                    "{}: no Bluetooth class reported",
                    self.address
                )));
            }
            let major = env
                .call_method(&class_obj, "getMajorDeviceClass", "()I", &[])
                .and_then(|v| v.i())
                .map_err(|e| bridge_err(env, "BluetoothClass.getMajorDeviceClass", e))?;
            let device_class = env
                .call_method(&class_obj, "getDeviceClass", "()I", &[])
                .and_then(|v| v.i())
                .map_err(|e| bridge_err(env, "BluetoothClass.getDeviceClass", e))?;

            let uuids: JObjectArray = env
                .call_method(device, "getUuids", "()[Landroid/os/ParcelUuid;", &[])
                .and_then(|v| v.l())
                .map_err(|e| bridge_err(env, "BluetoothDevice.getUuids", e))?
                .into();
            let service_ids = if uuids.is_null() {
                None
            } else {
                let len = env
                    .get_array_length(&uuids)
                    .map_err(|e| bridge_err(env, "get_array_length(uuids)", e))?;
                let mut ids = Vec::with_capacity(len as usize);
                for i in 0..len {
                    if let Some(id) = local_frame(env, 4, |env| service_uuid(env, &uuids, i))? {
                        ids.push(id);
                    }
                }
                Some(ids)
            };

            Ok(DeviceDescriptor {
                address: self.address.clone(),
                name,
                class: DeviceClass::new(major as u16, device_class as u16),
                service_ids,
            })
        })
    }

    fn open_secure(&self, service: Uuid) -> Result<Arc<dyn RfcommChannel>> {
        in_local_frame(8, |env| {
            let j_text: JString = env
                .new_string(service.to_string())
                .map_err(|e| bridge_err(env, "new_string(uuid)", e))?;
            let j_uuid = env
                .call_static_method(
                    "java/util/UUID",
                    "fromString",
                    "(Ljava/lang/String;)Ljava/util/UUID;",
                    &[JValue::Object(&j_text)],
                )
                .and_then(|v| v.l())
                .map_err(|e| bridge_err(env, "UUID.fromString", e))?;

            let socket = env
                .call_method(
                    self.device.as_obj(),
                    "createRfcommSocketToServiceRecord",
                    format!("(Ljava/util/UUID;){SOCKET_SIG}"),
                    &[JValue::Object(&j_uuid)],
                )
                .and_then(|v| v.l())
                .map_err(|e| {
                    ThermlinkError::Connection(java_failure(env, "createRfcommSocketToServiceRecord", e))
                })?;

            self.wrap_socket(env, socket)
        })
    }

    /// Insecure socket first, then the plain hidden constructor; older
    /// firmware answers only one of them.
    fn open_raw(&self, channel: u8) -> Result<Arc<dyn RfcommChannel>> {
        in_local_frame(8, |env| {
            let socket = match self.raw_socket(env, "createInsecureRfcommSocket", channel) {
                Ok(socket) => socket,
                Err(first) => {
                    tracing::warn!(error = %first, "insecure raw socket unavailable, trying createRfcommSocket");
                    self.raw_socket(env, "createRfcommSocket", channel)
                        .map_err(|second| {
                            ThermlinkError::Connection(format!(
                                "could not create fallback socket: {first}; {second}"
                            ))
                        })?
                }
            };

            self.wrap_socket(env, socket)
        })
    }
}

/// Parse element `i` of a `ParcelUuid[]`. Unparsable entries are skipped.
fn service_uuid(env: &mut JNIEnv<'_>, uuids: &JObjectArray<'_>, i: i32) -> Result<Option<Uuid>> {
    let parcel = env
        .get_object_array_element(uuids, i)
        .map_err(|e| bridge_err(env, "get_object_array_element(uuids)", e))?;
    let text = env
        .call_method(&parcel, "toString", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .map_err(|e| bridge_err(env, "ParcelUuid.toString", e))?;
    let Some(text) = java_string(env, text).map_err(|e| bridge_err(env, "get_string(uuid)", e))? else {
        return Ok(None);
    };
    match Uuid::parse_str(&text) {
        Ok(id) => Ok(Some(id)),
        Err(e) => {
            tracing::debug!(uuid = %text, error = %e, "skipping unparsable service UUID");
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// RFCOMM channel: android.bluetooth.BluetoothSocket
// ---------------------------------------------------------------------------

/// A `BluetoothSocket` plus its output stream once connected.
pub struct AndroidChannel {
    socket: GlobalRef,
    output: Mutex<Option<GlobalRef>>,
}

impl AndroidChannel {
    fn output_stream(&self) -> Result<GlobalRef> {
        self.output
            .lock()
            .map_err(|_| ThermlinkError::Bridge("output stream lock poisoned".into()))?
            .clone()
            .ok_or(ThermlinkError::NotConnected)
    }
}

impl RfcommChannel for AndroidChannel {
    fn connect(&self) -> Result<()> {
        in_local_frame(8, |env| {
            env.call_method(self.socket.as_obj(), "connect", "()V", &[])
                .map_err(|e| ThermlinkError::Connection(java_failure(env, "BluetoothSocket.connect", e)))?;

            let stream = env
                .call_method(
                    self.socket.as_obj(),
                    "getOutputStream",
                    "()Ljava/io/OutputStream;",
                    &[],
                )
                .and_then(|v| v.l())
                .map_err(|e| ThermlinkError::Connection(java_failure(env, "getOutputStream", e)))?;
            let stream = env
                .new_global_ref(stream)
                .map_err(|e| bridge_err(env, "new_global_ref(stream)", e))?;

            *self
                .output
                .lock()
                .map_err(|_| ThermlinkError::Bridge("output stream lock poisoned".into()))? = Some(stream);
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        let result = in_local_frame(4, |env| {
            env.call_method(self.socket.as_obj(), "isConnected", "()Z", &[])
                .and_then(|v| v.z())
                .map_err(|e| bridge_err(env, "BluetoothSocket.isConnected", e))
        });
        result.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "connectivity check failed");
            false
        })
    }

    fn write_all(&self, data: &[u8]) -> Result<()> {
        let stream = self.output_stream()?;
        // The payload copy is a local ref; the frame frees it on return.
        in_local_frame(4, |env| {
            let bytes = env
                .byte_array_from_slice(data)
                .map_err(|e| bridge_err(env, "byte_array_from_slice", e))?;
            env.call_method(stream.as_obj(), "write", "([B)V", &[JValue::Object(&bytes)])
                .map_err(|e| ThermlinkError::Write(java_failure(env, "OutputStream.write", e)))?;
            Ok(())
        })
    }

    fn flush(&self) -> Result<()> {
        let stream = self.output_stream()?;
        in_local_frame(4, |env| {
            env.call_method(stream.as_obj(), "flush", "()V", &[])
                .map_err(|e| ThermlinkError::Write(java_failure(env, "OutputStream.flush", e)))?;
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        let stream = self
            .output
            .lock()
            .map_err(|_| ThermlinkError::Bridge("output stream lock poisoned".into()))?
            .take();

        in_local_frame(4, |env| {
            if let Some(stream) = stream {
                if let Err(e) = env.call_method(stream.as_obj(), "close", "()V", &[]) {
                    let msg = java_failure(env, "OutputStream.close", e);
                    tracing::warn!(error = %msg, "error closing output stream");
                }
            }

            env.call_method(self.socket.as_obj(), "close", "()V", &[])
                .map_err(|e| bridge_err(env, "BluetoothSocket.close", e))?;
            Ok(())
        })
    }
}
