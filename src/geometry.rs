use nalgebra::Vector3;

/// ランドマーク空間の3D点・ベクトル
pub type Vec3 = Vector3<f32>;

pub fn subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    a - b
}

/// `s != 0` の確認は呼び出し側で行う
pub fn scale_divide(v: &Vec3, s: f32) -> Vec3 {
    v / s
}

/// ユークリッド長
pub fn norm(v: &Vec3) -> f32 {
    v.norm()
}

pub fn midpoint(a: &Vec3, b: &Vec3) -> Vec3 {
    (a + b) / 2.0
}

/// 頂点 `b` における `b->a` と `b->c` のなす角（度）
/// どちらかの長さが0なら0.0
pub fn angle(a: &Vec3, b: &Vec3, c: &Vec3) -> f32 {
    let ba = subtract(a, b);
    let bc = subtract(c, b);
    let denom = norm(&ba) * norm(&bc);
    if denom == 0.0 {
        return 0.0;
    }
    let cos = (ba.dot(&bc) / denom).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}
